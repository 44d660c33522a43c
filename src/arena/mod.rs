//! Executable code arena - page-backed storage for compiled trampolines
//!
//! Design: one arena per linked class. Trampolines are copied in while the pages are
//! writable, then the whole region flips to read+execute in a single protection change.
//! Nothing is written after the flip.
//!
//! Architecture:
//! - `os.rs` - mmap/VirtualAlloc page primitives and instruction cache flush

mod os;


pub use os::page_size;

use crate::logging;
use core::ptr::NonNull;

/// Stub entry alignment inside the arena
pub const STUB_ALIGN: usize = 8;

/// Arena lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaState {
    Writable,
    Executable,
}

/// Region of OS pages holding concatenated trampolines
pub struct CodeArena {
    base: NonNull<u8>,
    capacity: usize,
    cursor: usize,
    state: ArenaState,
}

// After finalize the region is immutable; before it, only the owner writes through &mut.
unsafe impl Send for CodeArena {}
unsafe impl Sync for CodeArena {}

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

impl CodeArena {
    /// Reserve writable pages for at least `total_bytes`
    pub fn allocate(total_bytes: usize) -> Result<Self, ArenaError> {
        if total_bytes == 0 {
            return Err(ArenaError::Empty);
        }

        let capacity = align_up(total_bytes, page_size());
        let ptr = os::reserve(capacity)?;
        let base = NonNull::new(ptr).ok_or(ArenaError::OutOfMemory { requested: capacity, os_code: None })?;

        logging::log_arena_allocated(capacity, base.as_ptr());
        Ok(Self { base, capacity, cursor: 0, state: ArenaState::Writable })
    }

    /// Copy one trampoline in at the next aligned offset
    pub fn write(&mut self, code: &[u8]) -> Result<usize, ArenaError> {
        if self.state != ArenaState::Writable {
            return Err(ArenaError::AlreadyFinalized);
        }

        let offset = align_up(self.cursor, STUB_ALIGN);
        let end = offset.checked_add(code.len()).ok_or(ArenaError::Capacity {
            needed: code.len(),
            remaining: self.remaining(),
        })?;
        if end > self.capacity {
            return Err(ArenaError::Capacity { needed: code.len(), remaining: self.remaining() });
        }

        unsafe {
            core::ptr::copy_nonoverlapping(code.as_ptr(), self.base.as_ptr().add(offset), code.len());
        }
        self.cursor = end;
        Ok(offset)
    }

    /// Flip the region to read+execute; only once
    pub fn finalize(&mut self) -> Result<(), ArenaError> {
        if self.state == ArenaState::Executable {
            return Err(ArenaError::AlreadyFinalized);
        }

        os::protect_executable(self.base.as_ptr(), self.capacity)?;
        os::flush_icache(self.base.as_ptr(), self.capacity);
        self.state = ArenaState::Executable;

        logging::log_arena_finalized(self.cursor, self.base.as_ptr());
        Ok(())
    }

    /// Executable address of the stub written at `offset`
    pub fn entry(&self, offset: usize) -> Result<*const u8, ArenaError> {
        if self.state != ArenaState::Executable {
            return Err(ArenaError::NotFinalized);
        }
        if offset >= self.cursor {
            return Err(ArenaError::OutOfBounds { offset, used: self.cursor });
        }
        Ok(unsafe { self.base.as_ptr().add(offset) as *const u8 })
    }

    /// Return the pages to the OS
    pub fn reclaim(self) -> Result<(), ArenaError> {
        let this = core::mem::ManuallyDrop::new(self);
        this.release()
    }

    fn release(&self) -> Result<(), ArenaError> {
        os::release(self.base.as_ptr(), self.capacity)?;
        logging::log_arena_reclaimed(self.capacity, self.base.as_ptr());
        Ok(())
    }

    #[inline]
    pub fn state(&self) -> ArenaState {
        self.state
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        self.state == ArenaState::Executable
    }

    /// Page-rounded size
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed, including alignment padding
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    #[inline]
    pub fn base(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Whether `addr` falls inside this arena
    pub fn contains(&self, addr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = addr as usize;
        addr >= start && addr < start + self.capacity
    }
}

impl Drop for CodeArena {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(error = %err, "failed to release code arena");
        }
    }
}

impl core::fmt::Debug for CodeArena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CodeArena")
            .field("base", &self.base)
            .field("capacity", &self.capacity)
            .field("used", &self.cursor)
            .field("state", &self.state)
            .finish()
    }
}

/// Arena errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Page reservation failed
    OutOfMemory { requested: usize, os_code: Option<i32> },
    /// Protection change failed
    Protect { os_code: Option<i32> },
    /// Returning pages failed
    Release { os_code: Option<i32> },
    /// Stub does not fit the reserved region
    Capacity { needed: usize, remaining: usize },
    /// Zero-byte request
    Empty,
    AlreadyFinalized,
    NotFinalized,
    OutOfBounds { offset: usize, used: usize },
    /// No page-protection primitive on this OS
    Unsupported,
}

impl core::fmt::Display for ArenaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        fn code(c: &Option<i32>) -> String {
            c.map(|c| format!(" (os error {})", c)).unwrap_or_default()
        }

        match self {
            Self::OutOfMemory { requested, os_code } => {
                write!(f, "Out of executable memory reserving {} bytes{}", requested, code(os_code))
            }
            Self::Protect { os_code } => write!(f, "Failed to make code pages executable{}", code(os_code)),
            Self::Release { os_code } => write!(f, "Failed to release code pages{}", code(os_code)),
            Self::Capacity { needed, remaining } => {
                write!(f, "Stub of {} bytes exceeds remaining arena space {}", needed, remaining)
            }
            Self::Empty => write!(f, "Cannot allocate an empty code arena"),
            Self::AlreadyFinalized => write!(f, "Code arena is already executable"),
            Self::NotFinalized => write!(f, "Code arena is not yet executable"),
            Self::OutOfBounds { offset, used } => {
                write!(f, "Offset {} is outside the {} written bytes", offset, used)
            }
            Self::Unsupported => write!(f, "Executable memory not supported on this platform"),
        }
    }
}

impl std::error::Error for ArenaError {}
