//! Platform capability flags

use crate::arena::CodeArena;
use crate::descriptor::Arch;
use crate::last_error;
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl OsFamily {
    pub const fn current() -> Self {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            Self::Linux
        } else if cfg!(target_vendor = "apple") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }
}

/// Inputs to strategy selection besides the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub arch: Option<Arch>,
    pub os: OsFamily,
    pub helper_present: bool,
    pub page_protection: bool,
}

/// Reserve, write, protect and release one page
fn probe_page_protection() -> bool {
    let result = CodeArena::allocate(1).and_then(|mut arena| {
        arena.write(&[0u8; 4])?;
        arena.finalize()?;
        arena.reclaim()
    });

    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "executable pages unavailable; compiled stubs disabled");
            false
        }
    }
}

static DETECTED: Lazy<Capabilities> = Lazy::new(|| Capabilities {
    arch: Arch::host(),
    os: OsFamily::current(),
    helper_present: last_error::helper_address() != 0,
    page_protection: probe_page_protection(),
});

impl Capabilities {
    /// Probe the running process once
    pub fn detect() -> Self {
        *DETECTED
    }

    /// Everything a compiled stub needs, for `arch` on a Unix-like OS
    pub const fn full(arch: Arch) -> Self {
        Self { arch: Some(arch), os: OsFamily::Linux, helper_present: true, page_protection: true }
    }

    #[inline]
    pub fn is_windows(&self) -> bool {
        self.os == OsFamily::Windows
    }
}
