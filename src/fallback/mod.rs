//! Generic buffer path - dynamic invocation of primitive signatures
//!
//! Design: slow but always available. Arguments travel as `RawValue` words, are
//! extended per native class, and reach the target through a fixed-shape function
//! pointer. The selector binds this when no compiled or register path accepts.
//!
//! Architecture:
//! - `value.rs` - RawValue word and extension rules
//! - `call.rs` - per-architecture fixed-shape call

mod call;
mod value;


pub use call::ReturnKind;
pub use value::{extend, to_host, RawValue};

use crate::descriptor::{Arch, CallDescriptor, RegisterClass, SlotType};
use crate::last_error;

fn return_kind(result: &SlotType) -> ReturnKind {
    match result.class.map(|c| c.class) {
        None => ReturnKind::Void,
        Some(RegisterClass::Integer) => ReturnKind::Integer,
        Some(RegisterClass::FloatSingle) => ReturnKind::Single,
        Some(RegisterClass::FloatDouble) => ReturnKind::Double,
    }
}

/// Reference invoker for one descriptor and target
#[derive(Debug, Clone)]
pub struct BufferInvoker {
    desc: CallDescriptor,
    target: usize,
}

impl BufferInvoker {
    /// Bind a primitive descriptor for the running architecture
    pub fn new(desc: CallDescriptor, target: usize) -> Result<Self, CallError> {
        if Arch::host() != Some(desc.arch()) {
            return Err(CallError::UnsupportedArchitecture);
        }
        if !desc.is_primitive() {
            return Err(CallError::NotPrimitive);
        }
        Ok(Self { desc, target })
    }

    #[inline]
    pub fn descriptor(&self) -> &CallDescriptor {
        &self.desc
    }

    #[inline]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Call the target with host values; no runtime context slots
    ///
    /// # Safety
    /// The target must have the native signature the descriptor declares.
    pub unsafe fn invoke(&self, args: &[RawValue]) -> Result<RawValue, CallError> {
        let params = self.desc.params();
        if args.len() != params.len() {
            return Err(CallError::ArgCountMismatch { expected: params.len(), got: args.len() });
        }

        let result = self.desc.result();
        let bits = self.call_impl(params, args, return_kind(result))?;
        if self.desc.error_capture() {
            last_error::save_last_error();
        }

        Ok(match result.class {
            None => RawValue::void(),
            Some(class) if class.is_integer() => to_host(bits, class, result.host),
            Some(_) => RawValue(bits),
        })
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    unsafe fn call_impl(&self, params: &[SlotType], args: &[RawValue], ret: ReturnKind) -> Result<u64, CallError> {
        let mut ints = [0u64; call::INT_REGS];
        let mut floats = [0f64; call::FLOAT_REGS];
        let (mut ni, mut nf) = (0, 0);

        for (slot, arg) in params.iter().zip(args) {
            let Some(class) = slot.class else {
                return Err(CallError::NotPrimitive);
            };
            match class.class {
                RegisterClass::Integer => {
                    *ints.get_mut(ni).ok_or(CallError::TooManyArgs)? = extend(arg.0, class);
                    ni += 1;
                }
                RegisterClass::FloatSingle | RegisterClass::FloatDouble => {
                    *floats.get_mut(nf).ok_or(CallError::TooManyArgs)? = f64::from_bits(arg.0);
                    nf += 1;
                }
            }
        }

        call::call_registers(self.target, &ints, &floats, ret)
    }

    #[cfg(target_arch = "x86")]
    unsafe fn call_impl(&self, params: &[SlotType], args: &[RawValue], ret: ReturnKind) -> Result<u64, CallError> {
        use crate::descriptor::Width;

        let mut words: smallvec::SmallVec<[u32; call::MAX_STACK_WORDS]> = smallvec::SmallVec::new();
        for (slot, arg) in params.iter().zip(args) {
            let Some(class) = slot.class else {
                return Err(CallError::NotPrimitive);
            };
            let bits = if class.is_integer() { extend(arg.0, class) } else { arg.0 };
            words.push(bits as u32);
            if class.width == Width::W64 {
                words.push((bits >> 32) as u32);
            }
        }

        call::call_stack(self.target, &words, ret)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86")))]
    unsafe fn call_impl(&self, _params: &[SlotType], _args: &[RawValue], _ret: ReturnKind) -> Result<u64, CallError> {
        Err(CallError::UnsupportedArchitecture)
    }
}

/// Buffer path errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    ArgCountMismatch { expected: usize, got: usize },
    TooManyArgs,
    NotPrimitive,
    UnsupportedArchitecture,
}

impl core::fmt::Display for CallError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ArgCountMismatch { expected, got } => {
                write!(f, "Expected {} arguments, got {}", expected, got)
            }
            Self::TooManyArgs => write!(f, "Too many arguments for the buffer path"),
            Self::NotPrimitive => write!(f, "Signature has non-primitive slots"),
            Self::UnsupportedArchitecture => write!(f, "Architecture not supported"),
        }
    }
}

impl std::error::Error for CallError {}
