//! Fixed-shape native calls
//!
//! The target is reinterpreted as a function taking every argument register the ABI has.
//! Unused registers carry zeros; the callee never looks at them.

use super::CallError;

/// How the native result comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    Integer,
    Single,
    Double,
}

/// Integer argument registers reachable by the register path
#[cfg(target_arch = "x86_64")]
pub const INT_REGS: usize = 6;
#[cfg(target_arch = "aarch64")]
pub const INT_REGS: usize = 8;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const INT_REGS: usize = 0;

pub const FLOAT_REGS: usize = 8;

/// Raw result: integer bits or float bits, f32 in the low half
#[cfg(target_arch = "x86_64")]
pub unsafe fn call_registers(
    target: usize,
    i: &[u64; INT_REGS],
    f: &[f64; FLOAT_REGS],
    ret: ReturnKind,
) -> Result<u64, CallError> {
    type IntFn = extern "C" fn(u64, u64, u64, u64, u64, u64, f64, f64, f64, f64, f64, f64, f64, f64) -> u64;
    type FloatFn = extern "C" fn(u64, u64, u64, u64, u64, u64, f64, f64, f64, f64, f64, f64, f64, f64) -> f64;

    Ok(match ret {
        ReturnKind::Void | ReturnKind::Integer => {
            let func: IntFn = core::mem::transmute(target);
            func(i[0], i[1], i[2], i[3], i[4], i[5], f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7])
        }
        ReturnKind::Single | ReturnKind::Double => {
            let func: FloatFn = core::mem::transmute(target);
            func(i[0], i[1], i[2], i[3], i[4], i[5], f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7]).to_bits()
        }
    })
}

#[cfg(target_arch = "aarch64")]
pub unsafe fn call_registers(
    target: usize,
    i: &[u64; INT_REGS],
    f: &[f64; FLOAT_REGS],
    ret: ReturnKind,
) -> Result<u64, CallError> {
    type IntFn = extern "C" fn(u64, u64, u64, u64, u64, u64, u64, u64, f64, f64, f64, f64, f64, f64, f64, f64) -> u64;
    type FloatFn = extern "C" fn(u64, u64, u64, u64, u64, u64, u64, u64, f64, f64, f64, f64, f64, f64, f64, f64) -> f64;

    Ok(match ret {
        ReturnKind::Void | ReturnKind::Integer => {
            let func: IntFn = core::mem::transmute(target);
            func(i[0], i[1], i[2], i[3], i[4], i[5], i[6], i[7], f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7])
        }
        ReturnKind::Single | ReturnKind::Double => {
            let func: FloatFn = core::mem::transmute(target);
            func(i[0], i[1], i[2], i[3], i[4], i[5], i[6], i[7], f[0], f[1], f[2], f[3], f[4], f[5], f[6], f[7])
                .to_bits()
        }
    })
}

/// Maximum stack words the i386 path dispatches
pub const MAX_STACK_WORDS: usize = 16;

#[cfg(target_arch = "x86")]
macro_rules! call_words {
    (@word $i:tt) => { u32 };
    ($target:expr, $w:expr, $ret:ty; $($i:tt)*) => {{
        let func: extern "C" fn($(call_words!(@word $i)),*) -> $ret = core::mem::transmute($target);
        func($($w[$i]),*)
    }};
}

#[cfg(target_arch = "x86")]
macro_rules! dispatch {
    ($target:expr, $w:expr, $ret:ty) => {
        match $w.len() {
            0 => call_words!($target, $w, $ret;),
            1 => call_words!($target, $w, $ret; 0),
            2 => call_words!($target, $w, $ret; 0 1),
            3 => call_words!($target, $w, $ret; 0 1 2),
            4 => call_words!($target, $w, $ret; 0 1 2 3),
            5 => call_words!($target, $w, $ret; 0 1 2 3 4),
            6 => call_words!($target, $w, $ret; 0 1 2 3 4 5),
            7 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6),
            8 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7),
            9 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8),
            10 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9),
            11 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9 10),
            12 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9 10 11),
            13 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9 10 11 12),
            14 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9 10 11 12 13),
            15 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14),
            16 => call_words!($target, $w, $ret; 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15),
            _ => return Err(CallError::TooManyArgs),
        }
    };
}

/// Stack-packed call; 64-bit results come back as edx:eax
#[cfg(target_arch = "x86")]
pub unsafe fn call_stack(target: usize, words: &[u32], ret: ReturnKind) -> Result<u64, CallError> {
    Ok(match ret {
        ReturnKind::Void | ReturnKind::Integer => dispatch!(target, words, u64),
        ReturnKind::Single => dispatch!(target, words, f32).to_bits() as u64,
        ReturnKind::Double => dispatch!(target, words, f64).to_bits(),
    })
}
