//! Stub linkage - arena attachment and call-site binding
//!
//! Design: a class load collects its trampolines in a `StubLinker`, which writes them all
//! into one arena, flips it executable once and hands back entry addresses. Each call
//! site binds exactly once.
//!
//! Architecture:
//! - `registry.rs` - weak class-to-arena registry and sweeping

pub mod registry;

#[cfg(test)]
mod tests;

use crate::arena::{ArenaError, CodeArena, STUB_ALIGN};
use crate::compiler::{CompileError, Trampoline};
use crate::config::StubConfig;
use crate::descriptor::CallDescriptor;
use crate::fallback::{BufferInvoker, CallError};
use crate::last_error;
use crate::logging;
use crate::selector::{FastPath, Strategy, StrategySelector};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;

/// A linked native method: name, signature and executable entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMethod {
    pub name: String,
    pub signature: String,
    address: usize,
}

impl NativeMethod {
    #[inline]
    pub fn address(&self) -> usize {
        self.address
    }
}

struct PendingStub {
    name: String,
    signature: String,
    trampoline: Trampoline,
}

/// Collects the trampolines of one class load
pub struct StubLinker {
    stubs: Vec<PendingStub>,
    dump_code: bool,
}

impl Default for StubLinker {
    fn default() -> Self {
        Self::new()
    }
}

impl StubLinker {
    pub fn new() -> Self {
        Self::with_config(StubConfig::global())
    }

    pub fn with_config(config: &StubConfig) -> Self {
        Self { stubs: Vec::new(), dump_code: config.dump_code }
    }

    pub fn add(&mut self, name: impl Into<String>, signature: impl Into<String>, trampoline: Trampoline) {
        self.stubs.push(PendingStub { name: name.into(), signature: signature.into(), trampoline });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Bytes reserved for the pending stubs, alignment slack included
    pub fn code_size(&self) -> usize {
        self.stubs.iter().map(|s| s.trampoline.size() + STUB_ALIGN).sum()
    }

    /// Write every stub into one arena owned by `class` and return the entries
    pub fn attach<T: Any + Send + Sync>(self, class: &Arc<T>) -> Result<Vec<NativeMethod>, LinkError> {
        if self.stubs.is_empty() {
            return Ok(Vec::new());
        }

        let mut arena = CodeArena::allocate(self.code_size())?;
        let offsets = self
            .stubs
            .iter()
            .map(|s| arena.write(s.trampoline.code()))
            .collect::<Result<Vec<_>, _>>()?;
        arena.finalize()?;

        let mut methods = Vec::with_capacity(self.stubs.len());
        for (stub, offset) in self.stubs.into_iter().zip(offsets) {
            if self.dump_code {
                logging::log_stub_dump(&stub.name, &stub.signature, &stub.trampoline.hex_dump());
            }
            let address = arena.entry(offset)? as usize;
            methods.push(NativeMethod { name: stub.name, signature: stub.signature, address });
        }

        registry::register(class, arena);
        Ok(methods)
    }
}

/// What a bound call site invokes
#[derive(Debug, Clone)]
pub enum Entry {
    /// Trampoline address under the hosting entry convention
    Compiled { address: usize },
    /// Target called directly by the runtime's register invoker
    FastPath { path: FastPath, target: usize },
    /// Generic path; the reference invoker is present for primitive host-arch signatures
    Generic { target: usize, invoker: Option<BufferInvoker> },
}

/// Strategy plus entry, fixed once bound
#[derive(Debug, Clone)]
pub struct Binding {
    pub strategy: Strategy,
    pub entry: Entry,
}

/// A method's call site; binds at most once
#[derive(Debug)]
pub struct CallSite {
    name: String,
    desc: CallDescriptor,
    target: usize,
    binding: OnceCell<Binding>,
}

impl CallSite {
    pub fn new(name: impl Into<String>, desc: CallDescriptor, target: usize) -> Self {
        Self { name: name.into(), desc, target, binding: OnceCell::new() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn descriptor(&self) -> &CallDescriptor {
        &self.desc
    }

    #[inline]
    pub fn target(&self) -> usize {
        self.target
    }

    /// Bind permanently; a second bind is refused
    pub fn bind(&self, binding: Binding) -> Result<&Binding, LinkError> {
        self.binding
            .set(binding)
            .map_err(|_| LinkError::AlreadyBound { name: self.name.clone() })?;
        self.binding.get().ok_or_else(|| LinkError::AlreadyBound { name: self.name.clone() })
    }

    #[inline]
    pub fn binding(&self) -> Option<&Binding> {
        self.binding.get()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Compiled entry address, if bound to a trampoline
    pub fn entry_address(&self) -> Option<usize> {
        match self.binding.get()?.entry {
            Entry::Compiled { address } => Some(address),
            _ => None,
        }
    }
}

/// Select, compile and attach every call site of one class
///
/// Sites already bound are left alone. Compiled sites share one arena registered
/// under `class`.
pub fn link_class<T: Any + Send + Sync>(
    class: &Arc<T>,
    selector: &StrategySelector,
    sites: &[CallSite],
) -> Result<(), LinkError> {
    let mut linker = StubLinker::with_config(selector.config());
    let mut compiled = Vec::new();

    for (index, site) in sites.iter().enumerate().filter(|(_, s)| !s.is_bound()) {
        let desc = site.descriptor();
        let strategy = selector.select(desc);

        let entry = match strategy {
            Strategy::CompiledTrampoline(_) => {
                let compiler = selector.compiler().ok_or_else(|| CompileError::Unsupported {
                    arch: desc.arch(),
                    signature: desc.signature(),
                })?;
                let helper = desc.error_capture().then(last_error::helper_address);
                let trampoline = compiler.compile(desc, site.target(), helper)?;
                linker.add(site.name(), desc.signature(), trampoline);
                compiled.push((index, strategy));
                continue;
            }
            Strategy::RegisterFastPath(path) => Entry::FastPath { path, target: site.target() },
            Strategy::GenericBufferPath => Entry::Generic {
                target: site.target(),
                invoker: BufferInvoker::new(desc.clone(), site.target()).ok(),
            },
        };
        site.bind(Binding { strategy, entry })?;
    }

    let methods = linker.attach(class)?;
    for ((index, strategy), method) in compiled.into_iter().zip(methods) {
        sites[index].bind(Binding { strategy, entry: Entry::Compiled { address: method.address() } })?;
    }
    Ok(())
}

/// Linkage errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    Arena(ArenaError),
    Compile(CompileError),
    Call(CallError),
    AlreadyBound { name: String },
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Arena(e) => write!(f, "Stub arena: {}", e),
            Self::Compile(e) => write!(f, "Stub compilation: {}", e),
            Self::Call(e) => write!(f, "Generic path: {}", e),
            Self::AlreadyBound { name } => write!(f, "Call site {} is already bound", name),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Arena(e) => Some(e),
            Self::Compile(e) => Some(e),
            Self::Call(e) => Some(e),
            Self::AlreadyBound { .. } => None,
        }
    }
}

impl From<ArenaError> for LinkError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}

impl From<CompileError> for LinkError {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

impl From<CallError> for LinkError {
    fn from(e: CallError) -> Self {
        Self::Call(e)
    }
}
