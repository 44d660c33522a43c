//! Type vocabulary for call descriptors
//!
//! Three layers: the upstream `NativeType`, the managed-side `HostType` carried in
//! the hosting convention slot, and the classified `ValueClass` the compilers work from.

use core::fmt;

/// Target architecture a descriptor is classified for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Arch {
    /// i386 System V, everything stack-passed
    X86_32,
    /// x86-64 System V
    X86_64,
    /// AArch64 AAPCS64
    Aarch64,
}

impl Arch {
    /// Architecture of the running process, if it is one we generate code for
    #[inline]
    pub const fn host() -> Option<Self> {
        #[cfg(target_arch = "x86_64")]
        return Some(Self::X86_64);

        #[cfg(target_arch = "x86")]
        return Some(Self::X86_32);

        #[cfg(target_arch = "aarch64")]
        return Some(Self::Aarch64);

        #[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
        return None;
    }

    /// Native pointer size in bytes
    #[inline]
    pub const fn pointer_size(self) -> usize {
        match self {
            Self::X86_32 => 4,
            Self::X86_64 | Self::Aarch64 => 8,
        }
    }

    /// Integer and float argument register budget, `None` for stack-only ABIs
    #[inline]
    pub const fn register_budget(self) -> Option<RegisterBudget> {
        match self {
            Self::X86_32 => None,
            Self::X86_64 | Self::Aarch64 => Some(RegisterBudget { integer: 6, float: 8 }),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_32 => write!(f, "i386"),
            Self::X86_64 => write!(f, "x86_64"),
            Self::Aarch64 => write!(f, "aarch64"),
        }
    }
}

/// Maximum register-passed real arguments after the two context slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBudget {
    pub integer: usize,
    pub float: usize,
}

/// Native type as declared by the upstream binding layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NativeType {
    Void,
    SChar,
    UChar,
    SShort,
    UShort,
    SInt,
    UInt,
    SLong,
    ULong,
    SLongLong,
    ULongLong,
    Float,
    Double,
    Address,
    Struct,
    Array,
    String,
}

impl NativeType {
    /// Size in bytes on `arch`, `None` for void and composites
    #[inline]
    pub const fn size(self, arch: Arch) -> Option<usize> {
        match self {
            Self::SChar | Self::UChar => Some(1),
            Self::SShort | Self::UShort => Some(2),
            Self::SInt | Self::UInt | Self::Float => Some(4),
            Self::SLongLong | Self::ULongLong | Self::Double => Some(8),
            Self::SLong | Self::ULong | Self::Address => Some(arch.pointer_size()),
            Self::Void | Self::Struct | Self::Array | Self::String => None,
        }
    }

    #[inline]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Struct | Self::Array | Self::String)
    }
}

/// Managed-side primitive occupying a hosting convention slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HostType {
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl HostType {
    /// Bytes the value occupies in a stack-passed hosting slot
    #[inline]
    pub const fn slot_size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 8,
            _ => 4,
        }
    }

    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::Byte | Self::Short | Self::Char | Self::Int | Self::Long
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// Register file a value travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Integer,
    FloatSingle,
    FloatDouble,
}

/// Value width in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Width {
    W8 = 8,
    W16 = 16,
    W32 = 32,
    W64 = 64,
}

impl Width {
    #[inline]
    pub const fn bytes(self) -> usize {
        (self as usize) / 8
    }

    const fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::W8),
            2 => Some(Self::W16),
            4 => Some(Self::W32),
            8 => Some(Self::W64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
    NotApplicable,
}

/// Classification triple carried by every parameter and non-void return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueClass {
    pub class: RegisterClass,
    pub width: Width,
    pub signedness: Signedness,
}

impl ValueClass {
    #[inline]
    pub const fn integer(width: Width, signedness: Signedness) -> Self {
        Self { class: RegisterClass::Integer, width, signedness }
    }

    /// Classify a native type for `arch`.
    ///
    /// Returns `None` for void and composite types; those never reach a compiler.
    /// On AArch64 the address width is taken as 64 bits unconditionally.
    pub const fn of(native: NativeType, arch: Arch) -> Option<Self> {
        use Signedness::*;
        let signedness = match native {
            NativeType::SChar
            | NativeType::SShort
            | NativeType::SInt
            | NativeType::SLong
            | NativeType::SLongLong => Signed,
            NativeType::UChar
            | NativeType::UShort
            | NativeType::UInt
            | NativeType::ULong
            | NativeType::ULongLong
            | NativeType::Address => Unsigned,
            NativeType::Float => {
                return Some(Self { class: RegisterClass::FloatSingle, width: Width::W32, signedness: NotApplicable })
            }
            NativeType::Double => {
                return Some(Self { class: RegisterClass::FloatDouble, width: Width::W64, signedness: NotApplicable })
            }
            NativeType::Void | NativeType::Struct | NativeType::Array | NativeType::String => return None,
        };

        let bytes = match (native, arch) {
            (NativeType::Address, Arch::Aarch64) => 8,
            _ => match native.size(arch) {
                Some(bytes) => bytes,
                None => return None,
            },
        };

        match Width::from_bytes(bytes) {
            Some(width) => Some(Self::integer(width, signedness)),
            None => None,
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(self.class, RegisterClass::Integer)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        !self.is_integer()
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self.signedness, Signedness::Signed)
    }

    /// Whether `host` may carry this class through the hosting convention
    pub const fn accepts_host(self, host: HostType) -> bool {
        match self.class {
            RegisterClass::Integer => host.is_integral(),
            RegisterClass::FloatSingle => matches!(host, HostType::Float),
            RegisterClass::FloatDouble => matches!(host, HostType::Double),
        }
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.class, self.signedness) {
            (RegisterClass::FloatSingle, _) => write!(f, "f32"),
            (RegisterClass::FloatDouble, _) => write!(f, "f64"),
            (RegisterClass::Integer, Signedness::Signed) => write!(f, "i{}", self.width as u8),
            (RegisterClass::Integer, _) => write!(f, "u{}", self.width as u8),
        }
    }
}
