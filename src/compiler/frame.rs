//! Direct vs Wrapped frame decision

use crate::descriptor::{Arch, CallDescriptor, HostType, RegisterClass, SlotType, Width};

/// Shape of the emitted trampoline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Argument moves then a tail jump; the target returns straight to the caller
    Direct,
    /// Own frame: call the target, post-process the result, return
    Wrapped,
}

impl core::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Wrapped => write!(f, "wrapped"),
        }
    }
}

/// Whether the native result already sits in the host's return register in host form
pub fn result_passes_through(result: &SlotType) -> bool {
    if result.is_void() {
        return matches!(result.host, HostType::Void);
    }
    let Some(class) = result.class else {
        return false;
    };

    match (class.class, class.width, result.host) {
        (RegisterClass::Integer, Width::W32, HostType::Int) => true,
        (RegisterClass::Integer, Width::W64, HostType::Long) => true,
        (RegisterClass::FloatSingle, _, HostType::Float) => true,
        (RegisterClass::FloatDouble, _, HostType::Double) => true,
        _ => false,
    }
}

/// Pick the frame for a descriptor the compiler has already accepted
pub fn select_frame(desc: &CallDescriptor) -> FrameKind {
    let direct = !desc.error_capture()
        && desc.arch() != Arch::X86_32
        && desc.fits_architecture_budget(desc.arch())
        && result_passes_through(desc.result());

    if direct {
        FrameKind::Direct
    } else {
        FrameKind::Wrapped
    }
}
