//! stubjit - load-time native call trampolines
//!
//! Compiles per-method machine-code stubs that adapt a managed runtime's native entry
//! convention (two leading context arguments) to the plain C ABI of the target,
//! with argument/result extension, boolean normalization and errno capture.
//! Signatures the compiler declines fall through to register fast paths or a
//! generic buffer-marshalling invoker.
//!
//! Architecture:
//! - `descriptor` - call descriptors and value classification
//! - `asm` - x86 and AArch64 instruction encoders
//! - `compiler` - per-architecture trampoline emitters
//! - `arena` - executable page arenas
//! - `linkage` - stub attachment, call-site binding, class registry
//! - `selector` - strategy ranking per platform
//! - `fallback` - generic buffer invoker
//! - `last_error` - per-thread error capture

pub mod arena;
pub mod asm;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod fallback;
pub mod last_error;
pub mod linkage;
pub mod logging;
pub mod selector;

pub use arena::{ArenaError, CodeArena};
pub use compiler::{CompileError, FrameKind, StubCompiler, Trampoline};
pub use config::{ConfigError, StubConfig};
pub use descriptor::{Arch, CallDescriptor, HostType, NativeType, ValueClass};
pub use fallback::{BufferInvoker, CallError, RawValue};
pub use linkage::{link_class, Binding, CallSite, Entry, LinkError, NativeMethod, StubLinker};
pub use selector::{Capabilities, FastPath, Strategy, StrategySelector};
