//! Trampoline compilers - one per architecture behind a single contract
//!
//! Design: the variant set is closed, so `StubCompiler` is a plain enum rather than a
//! trait object. Each variant accepts or declines a descriptor and emits position
//! independent bytes that only embed absolute addresses.
//!
//! Architecture:
//! - `frame.rs` - Direct vs Wrapped decision
//! - `x86_64.rs` - System V register shuffling
//! - `x86_32.rs` - stack block rebuild, always wrapped
//! - `aarch64.rs` - x2..x7 shuffling, movz/movk addressing

pub mod frame;
mod aarch64;
mod x86_32;
mod x86_64;


pub use frame::{select_frame, FrameKind};
pub use x86_32::stack_adjust;

use crate::descriptor::{Arch, CallDescriptor};
use crate::logging;

/// Compiled trampoline bound to one descriptor and one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trampoline {
    code: Vec<u8>,
    frame: FrameKind,
    arch: Arch,
    target: usize,
}

impl Trampoline {
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn frame(&self) -> FrameKind {
        self.frame
    }

    #[inline]
    pub fn arch(&self) -> Arch {
        self.arch
    }

    #[inline]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Space-separated hex bytes, 16 per line
    pub fn hex_dump(&self) -> String {
        self.code
            .chunks(16)
            .map(|line| line.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-architecture trampoline compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubCompiler {
    X86_32,
    X86_64,
    Aarch64,
}

impl StubCompiler {
    pub const fn for_arch(arch: Arch) -> Self {
        match arch {
            Arch::X86_32 => Self::X86_32,
            Arch::X86_64 => Self::X86_64,
            Arch::Aarch64 => Self::Aarch64,
        }
    }

    /// Compiler for the running process; none on Windows or unknown CPUs
    pub fn for_platform() -> Option<Self> {
        if cfg!(windows) {
            return None;
        }
        Arch::host().map(Self::for_arch)
    }

    pub const fn arch(self) -> Arch {
        match self {
            Self::X86_32 => Arch::X86_32,
            Self::X86_64 => Arch::X86_64,
            Self::Aarch64 => Arch::Aarch64,
        }
    }

    /// Accept or decline a descriptor; never fails
    pub fn can_compile(self, desc: &CallDescriptor) -> bool {
        if desc.arch() != self.arch() {
            return false;
        }
        match self {
            Self::X86_32 => x86_32::can_compile(desc),
            Self::X86_64 => x86_64::can_compile(desc),
            Self::Aarch64 => aarch64::can_compile(desc),
        }
    }

    /// Emit a trampoline calling `target`, and `helper` after it when capture is requested
    pub fn compile(self, desc: &CallDescriptor, target: usize, helper: Option<usize>) -> Result<Trampoline, CompileError> {
        if !self.can_compile(desc) {
            logging::log_stub_declined(&desc.signature(), self.arch());
            return Err(CompileError::Unsupported { arch: self.arch(), signature: desc.signature() });
        }

        let helper = match (desc.error_capture(), helper) {
            (true, None) => return Err(CompileError::MissingHelper),
            (true, Some(h)) => Some(h),
            (false, _) => None,
        };

        if self == Self::X86_32 {
            for address in core::iter::once(target).chain(helper) {
                if u32::try_from(address).is_err() {
                    return Err(CompileError::AddressOutOfRange { address });
                }
            }
        }

        let frame = select_frame(desc);
        let code = match self {
            Self::X86_32 => x86_32::emit(desc, target, helper),
            Self::X86_64 => x86_64::emit(desc, target, helper, frame),
            Self::Aarch64 => aarch64::emit(desc, target, helper, frame),
        };

        logging::log_stub_compiled(&desc.signature(), self.arch(), frame, code.len());
        Ok(Trampoline { code, frame, arch: self.arch(), target })
    }
}

/// Compilation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Descriptor declined by `can_compile`
    Unsupported { arch: Arch, signature: String },
    /// Error capture requested without a helper address
    MissingHelper,
    /// Address not encodable on a 32-bit target
    AddressOutOfRange { address: usize },
}

impl core::fmt::Display for CompileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unsupported { arch, signature } => {
                write!(f, "Signature {} not compilable for {}", signature, arch)
            }
            Self::MissingHelper => write!(f, "Error capture requested but no helper address given"),
            Self::AddressOutOfRange { address } => {
                write!(f, "Address {:#x} does not fit a 32-bit immediate", address)
            }
        }
    }
}

impl std::error::Error for CompileError {}
