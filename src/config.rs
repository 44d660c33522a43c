//! Static configuration for strategy selection and code dumps

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubConfig {
    /// Offer compiled trampolines at all
    #[serde(default = "default_true")]
    pub compile_enabled: bool,

    #[serde(default = "default_true")]
    pub fast_int_enabled: bool,

    #[serde(default = "default_true")]
    pub fast_long_enabled: bool,

    #[serde(default = "default_true")]
    pub fast_numeric_enabled: bool,

    /// Hex-dump every compiled stub at debug level
    #[serde(default = "default_false")]
    pub dump_code: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            compile_enabled: true,
            fast_int_enabled: true,
            fast_long_enabled: true,
            fast_numeric_enabled: true,
            dump_code: false,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

static GLOBAL: Lazy<StubConfig> = Lazy::new(|| match StubConfig::from_env() {
    Ok(config) => config,
    Err(err) => {
        tracing::warn!(error = %err, "ignoring invalid stub configuration");
        StubConfig::default()
    }
});

impl StubConfig {
    /// Process-wide configuration, read from the environment once
    pub fn global() -> &'static StubConfig {
        &GLOBAL
    }

    /// Defaults overridden by `STUBJIT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let fields: [(&str, &mut bool); 5] = [
            ("STUBJIT_ASM_ENABLED", &mut config.compile_enabled),
            ("STUBJIT_FAST_INT", &mut config.fast_int_enabled),
            ("STUBJIT_FAST_LONG", &mut config.fast_long_enabled),
            ("STUBJIT_FAST_NUMERIC", &mut config.fast_numeric_enabled),
            ("STUBJIT_DUMP", &mut config.dump_code),
        ];

        for (key, field) in fields {
            if let Some(value) = lookup(key) {
                *field = parse_flag(key, &value)?;
            }
        }
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue { key: String, value: String },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Failed to read config: {}", msg),
            Self::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            Self::InvalidValue { key, value } => write!(f, "Invalid value {:?} for {}", value, key),
        }
    }
}

impl std::error::Error for ConfigError {}
