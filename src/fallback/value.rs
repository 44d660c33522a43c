//! Raw argument and result words for the buffer path

use crate::descriptor::{HostType, ValueClass, Width};

/// One host value as a 64-bit word
///
/// Integers are stored sign-extended from their host width, floats as their IEEE bits
/// (f32 in the low half).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct RawValue(pub u64);

impl RawValue {
    #[inline]
    pub const fn void() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn from_i64(v: i64) -> Self {
        Self(v as u64)
    }

    #[inline]
    pub const fn from_i32(v: i32) -> Self {
        Self(v as i64 as u64)
    }

    #[inline]
    pub const fn from_bool(v: bool) -> Self {
        Self(v as u64)
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }

    #[inline]
    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits() as u64)
    }

    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self(v.to_bits())
    }

    #[inline]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    #[inline]
    pub const fn as_bool(self) -> bool {
        self.0 != 0
    }
}

/// Sign- or zero-extend the low `class.width` bits to 64
#[inline]
pub fn extend(bits: u64, class: ValueClass) -> u64 {
    if class.width == Width::W64 {
        return bits;
    }
    let shift = 64 - class.width as u32;
    if class.is_signed() {
        (((bits << shift) as i64) >> shift) as u64
    } else {
        (bits << shift) >> shift
    }
}

/// Convert a native integer result into its host representation
#[inline]
pub fn to_host(bits: u64, class: ValueClass, host: HostType) -> RawValue {
    let value = extend(bits, class);
    match host {
        HostType::Boolean => RawValue::from_bool(value != 0),
        _ => RawValue(value),
    }
}
