//! Call descriptors and the register classifier
//!
//! Design: a descriptor is built once from an already validated upstream signature and
//! never changes. Classification is pure; nothing here touches memory or the OS.
//!
//! Architecture:
//! - `types.rs` - NativeType, HostType, ValueClass triple, Arch and register budgets

mod types;

#[cfg(test)]
mod tests;

pub use types::{
    Arch, HostType, NativeType, RegisterBudget, RegisterClass, Signedness, ValueClass, Width,
};

use core::fmt;
use smallvec::SmallVec;

/// One parameter or return value: the declared native type, the hosting slot type,
/// and the classification derived from both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotType {
    pub native: NativeType,
    pub host: HostType,
    pub class: Option<ValueClass>,
}

impl SlotType {
    fn classify(native: NativeType, host: HostType, arch: Arch) -> Self {
        Self { native, host, class: ValueClass::of(native, arch) }
    }

    /// Primitive with a host type that can carry it
    #[inline]
    pub fn is_compilable(&self) -> bool {
        matches!(self.class, Some(class) if class.accepts_host(self.host))
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self.native, NativeType::Void)
    }
}

/// Immutable, classified call signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallDescriptor {
    params: SmallVec<[SlotType; 8]>,
    result: SlotType,
    error_capture: bool,
    arch: Arch,
    integer_count: usize,
    float_count: usize,
}

impl CallDescriptor {
    /// Start a descriptor for `arch`
    pub fn builder(arch: Arch) -> DescriptorBuilder {
        DescriptorBuilder {
            arch,
            params: SmallVec::new(),
            result: (NativeType::Void, HostType::Void),
            error_capture: false,
        }
    }

    #[inline]
    pub fn arch(&self) -> Arch {
        self.arch
    }

    #[inline]
    pub fn params(&self) -> &[SlotType] {
        &self.params
    }

    #[inline]
    pub fn result(&self) -> &SlotType {
        &self.result
    }

    #[inline]
    pub fn error_capture(&self) -> bool {
        self.error_capture
    }

    /// Parameters travelling in the integer register file
    #[inline]
    pub fn integer_count(&self) -> usize {
        self.integer_count
    }

    /// Parameters travelling in the float register file
    #[inline]
    pub fn float_count(&self) -> usize {
        self.float_count
    }

    /// Register budget check; stack-only architectures always fit
    pub fn fits_architecture_budget(&self, arch: Arch) -> bool {
        match arch.register_budget() {
            Some(budget) => self.integer_count <= budget.integer && self.float_count <= budget.float,
            None => true,
        }
    }

    /// Every parameter and the result are primitives carried by compatible host types
    pub fn is_primitive(&self) -> bool {
        let result_ok = (self.result.is_void() && matches!(self.result.host, HostType::Void))
            || self.result.is_compilable();
        result_ok && self.params.iter().all(SlotType::is_compilable)
    }

    /// Integer-class parameters in declaration order
    pub fn integer_params(&self) -> impl Iterator<Item = (&SlotType, ValueClass)> + '_ {
        self.params.iter().filter_map(|p| match p.class {
            Some(class) if class.is_integer() => Some((p, class)),
            _ => None,
        })
    }

    /// Short signature string, e.g. `(i8, f64) -> u32`
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn slot(f: &mut fmt::Formatter<'_>, s: &SlotType) -> fmt::Result {
            match s.class {
                Some(class) => write!(f, "{}", class),
                None => write!(f, "{:?}", s.native),
            }
        }

        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            slot(f, p)?;
        }
        write!(f, ") -> ")?;
        if self.result.is_void() {
            write!(f, "void")?;
        } else {
            slot(f, &self.result)?;
        }
        if self.error_capture {
            write!(f, " [errno]")?;
        }
        Ok(())
    }
}

/// Builder for [`CallDescriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    arch: Arch,
    params: SmallVec<[(NativeType, HostType); 8]>,
    result: (NativeType, HostType),
    error_capture: bool,
}

impl DescriptorBuilder {
    /// Append a parameter
    pub fn param(mut self, native: NativeType, host: HostType) -> Self {
        self.params.push((native, host));
        self
    }

    /// Set the return type
    pub fn returns(mut self, native: NativeType, host: HostType) -> Self {
        self.result = (native, host);
        self
    }

    /// Request the error-capture helper after the native call
    pub fn capture_errors(mut self, enabled: bool) -> Self {
        self.error_capture = enabled;
        self
    }

    pub fn build(self) -> CallDescriptor {
        let arch = self.arch;
        let params: SmallVec<[SlotType; 8]> = self
            .params
            .iter()
            .map(|&(native, host)| SlotType::classify(native, host, arch))
            .collect();

        let integer_count = params
            .iter()
            .filter(|p| matches!(p.class, Some(c) if c.is_integer()))
            .count();
        let float_count = params
            .iter()
            .filter(|p| matches!(p.class, Some(c) if c.is_float()))
            .count();

        CallDescriptor {
            params,
            result: SlotType::classify(self.result.0, self.result.1, arch),
            error_capture: self.error_capture,
            arch,
            integer_count,
            float_count,
        }
    }
}
