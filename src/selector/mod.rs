//! Invocation strategy selection
//!
//! Design: a fixed ranking tried in order, first acceptor wins. The result depends only
//! on the descriptor, the platform capabilities and the static configuration, so the
//! same descriptor always binds the same way within a process.
//!
//! Architecture:
//! - `platform.rs` - CPU/OS/helper/page-protection capability flags

mod platform;


pub use platform::{Capabilities, OsFamily};

use crate::compiler::StubCompiler;
use crate::config::StubConfig;
use crate::descriptor::{Arch, CallDescriptor, RegisterClass, SlotType, Width};
use crate::logging;
use smallvec::SmallVec;

/// Most parameters a register fast path takes
pub const FAST_PATH_MAX_PARAMS: usize = 6;

/// Register fast-path flavours, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FastPath {
    Int32,
    Int64,
    Numeric,
}

impl FastPath {
    fn slot_ok(self, slot: &SlotType, arch: Arch) -> bool {
        let Some(class) = slot.class else {
            return false;
        };
        match self {
            Self::Int32 => class.class == RegisterClass::Integer && class.width <= Width::W32,
            Self::Int64 => class.class == RegisterClass::Integer && arch == Arch::X86_64,
            Self::Numeric => true,
        }
    }

    fn arch_ok(self, arch: Arch) -> bool {
        match self {
            Self::Int32 | Self::Numeric => matches!(arch, Arch::X86_32 | Arch::X86_64),
            Self::Int64 => arch == Arch::X86_64,
        }
    }

    pub fn accepts(self, desc: &CallDescriptor) -> bool {
        let arch = desc.arch();
        if !self.arch_ok(arch) || desc.params().len() > FAST_PATH_MAX_PARAMS || !desc.is_primitive() {
            return false;
        }
        let result = desc.result();
        (result.is_void() || self.slot_ok(result, arch)) && desc.params().iter().all(|p| self.slot_ok(p, arch))
    }
}

/// Ranked invocation strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    CompiledTrampoline(Arch),
    RegisterFastPath(FastPath),
    GenericBufferPath,
}

impl Strategy {
    /// Descriptor-level acceptance, ignoring platform gating
    pub fn accepts(self, desc: &CallDescriptor) -> bool {
        match self {
            Self::CompiledTrampoline(arch) => StubCompiler::for_arch(arch).can_compile(desc),
            Self::RegisterFastPath(path) => path.accepts(desc),
            Self::GenericBufferPath => true,
        }
    }
}

impl core::fmt::Display for Strategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CompiledTrampoline(arch) => write!(f, "compiled-{}", arch),
            Self::RegisterFastPath(FastPath::Int32) => write!(f, "fast-int"),
            Self::RegisterFastPath(FastPath::Int64) => write!(f, "fast-long"),
            Self::RegisterFastPath(FastPath::Numeric) => write!(f, "fast-numeric"),
            Self::GenericBufferPath => write!(f, "buffer"),
        }
    }
}

/// Picks a strategy per descriptor
#[derive(Debug, Clone)]
pub struct StrategySelector {
    caps: Capabilities,
    config: StubConfig,
}

impl StrategySelector {
    pub fn new(caps: Capabilities, config: StubConfig) -> Self {
        Self { caps, config }
    }

    /// Probed capabilities and the process configuration
    pub fn for_platform() -> Self {
        Self::new(Capabilities::detect(), StubConfig::global().clone())
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    /// Compiler offered on this platform, if any
    pub fn compiler(&self) -> Option<StubCompiler> {
        let arch = self.caps.arch?;
        let offered = self.config.compile_enabled && !self.caps.is_windows() && self.caps.page_protection;
        offered.then(|| StubCompiler::for_arch(arch))
    }

    /// Strategies offered on this platform, in trial order
    pub fn candidates(&self) -> SmallVec<[Strategy; 5]> {
        let mut out = SmallVec::new();

        if let Some(compiler) = self.compiler() {
            out.push(Strategy::CompiledTrampoline(compiler.arch()));
        }

        if !self.caps.is_windows() {
            let flags = [
                (FastPath::Int32, self.config.fast_int_enabled),
                (FastPath::Int64, self.config.fast_long_enabled),
                (FastPath::Numeric, self.config.fast_numeric_enabled),
            ];
            for (path, enabled) in flags {
                if enabled && self.caps.arch.is_some_and(|arch| path.arch_ok(arch)) {
                    out.push(Strategy::RegisterFastPath(path));
                }
            }
        }

        out.push(Strategy::GenericBufferPath);
        out
    }

    /// First strategy in the ranking that takes `desc`
    pub fn select(&self, desc: &CallDescriptor) -> Strategy {
        let strategy = self
            .candidates()
            .into_iter()
            .find(|s| self.admits(*s, desc))
            .unwrap_or(Strategy::GenericBufferPath);

        logging::log_strategy_selected(&desc.signature(), &strategy);
        strategy
    }

    fn admits(&self, strategy: Strategy, desc: &CallDescriptor) -> bool {
        match strategy {
            Strategy::CompiledTrampoline(_) => {
                (!desc.error_capture() || self.caps.helper_present) && strategy.accepts(desc)
            }
            _ => strategy.accepts(desc),
        }
    }
}
