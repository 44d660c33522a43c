//! Logging infrastructure - structured tracing for stub compilation and linkage
//!
//! Design: `tracing` events with stable `event = ...` keys so compiled-stub and arena
//! lifecycles can be filtered. Nothing is emitted on the call path itself.

use crate::compiler::FrameKind;
use crate::descriptor::Arch;
use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking file writer alive
static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; console only when `None`
    pub log_path: Option<String>,
    /// JSON lines instead of human-readable output
    pub json_format: bool,
    /// Show span enter/exit events
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: Level::WARN, log_path: None, json_format: false, show_spans: false }
    }
}

fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // STUBJIT_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = lookup("STUBJIT_LOG_LEVEL").as_deref().and_then(parse_level) {
            config.level = level;
        }

        config.log_path = lookup("STUBJIT_LOG_FILE").filter(|p| !p.is_empty());
        config.json_format = lookup("STUBJIT_LOG_JSON").is_some();
        config.show_spans = lookup("STUBJIT_LOG_SPANS").is_some();

        config
    }

    /// Verbose config for debugging stub generation
    pub fn debug() -> Self {
        Self { level: Level::TRACE, log_path: None, json_format: false, show_spans: true }
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration; later calls are no-ops
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("stubjit={}", config.level.as_str().to_lowercase())));

        let span_events = if config.show_spans { FmtSpan::ENTER | FmtSpan::CLOSE } else { FmtSpan::NONE };

        let layer = match &config.log_path {
            Some(path) => {
                let path = std::path::Path::new(path);
                let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
                let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "stubjit.log".into());
                let appender = tracing_appender::rolling::never(dir, name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);

                let base = fmt::layer().with_writer(writer).with_ansi(false).with_span_events(span_events);
                if config.json_format {
                    base.json().boxed()
                } else {
                    base.boxed()
                }
            }
            None => {
                let base = fmt::layer()
                    .with_writer(io::stderr)
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_thread_ids(cfg!(debug_assertions));
                if config.json_format {
                    base.json().boxed()
                } else {
                    base.boxed()
                }
            }
        };

        // Another subscriber may already be installed by the embedding runtime
        let _ = tracing_subscriber::registry().with(env_filter).with(layer).try_init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Log a compiled trampoline
pub fn log_stub_compiled(signature: &str, arch: Arch, frame: FrameKind, size: usize) {
    use tracing::debug;
    debug!(
        event = "stub_compiled",
        signature = signature,
        arch = %arch,
        frame = %frame,
        size_bytes = size,
        "Trampoline compiled"
    );
}

/// Log a declined descriptor
pub fn log_stub_declined(signature: &str, arch: Arch) {
    use tracing::trace;
    trace!(
        event = "stub_declined",
        signature = signature,
        arch = %arch,
        "Compiler declined signature"
    );
}

/// Dump trampoline bytes
pub fn log_stub_dump(name: &str, signature: &str, hex: &str) {
    use tracing::debug;
    debug!(
        event = "stub_dump",
        name = name,
        signature = signature,
        "\n{}",
        hex
    );
}

/// Log page reservation
#[inline]
pub fn log_arena_allocated(size: usize, base: *const u8) {
    use tracing::trace;
    trace!(
        event = "arena_allocated",
        size_bytes = size,
        address = ?base,
        "Code arena reserved"
    );
}

/// Log protection flip
pub fn log_arena_finalized(used: usize, base: *const u8) {
    use tracing::debug;
    debug!(
        event = "arena_finalized",
        used_bytes = used,
        address = ?base,
        "Code arena made executable"
    );
}

/// Log page release
pub fn log_arena_reclaimed(size: usize, base: *const u8) {
    use tracing::debug;
    debug!(
        event = "arena_reclaimed",
        size_bytes = size,
        address = ?base,
        "Code arena released"
    );
}

/// Log a strategy binding
pub fn log_strategy_selected(signature: &str, strategy: &dyn core::fmt::Display) {
    use tracing::debug;
    debug!(
        event = "strategy_selected",
        signature = signature,
        strategy = %strategy,
        "Invocation strategy selected"
    );
}

/// Log registry expunge
pub fn log_registry_swept(expunged: usize, remaining: usize) {
    use tracing::trace;
    trace!(
        event = "registry_swept",
        expunged = expunged,
        remaining = remaining,
        "Stale stub arenas expunged"
    );
}
