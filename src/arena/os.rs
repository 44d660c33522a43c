//! OS page primitives - reserve, protect, release, icache flush
//!
//! Unix uses mmap/mprotect/munmap. Windows uses VirtualAlloc/VirtualProtect/VirtualFree.

use super::ArenaError;

/// Last OS error code, if any
#[inline]
fn os_code() -> Option<i32> {
    std::io::Error::last_os_error().raw_os_error()
}

#[cfg(unix)]
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}

#[cfg(unix)]
pub fn reserve(len: usize) -> Result<*mut u8, ArenaError> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_ANON | libc::MAP_PRIVATE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(ArenaError::OutOfMemory { requested: len, os_code: os_code() });
    }
    Ok(ptr as *mut u8)
}

#[cfg(unix)]
pub fn protect_executable(ptr: *mut u8, len: usize) -> Result<(), ArenaError> {
    let rc = unsafe { libc::mprotect(ptr as *mut libc::c_void, len, libc::PROT_READ | libc::PROT_EXEC) };
    if rc != 0 {
        return Err(ArenaError::Protect { os_code: os_code() });
    }
    Ok(())
}

#[cfg(unix)]
pub fn release(ptr: *mut u8, len: usize) -> Result<(), ArenaError> {
    let rc = unsafe { libc::munmap(ptr as *mut libc::c_void, len) };
    if rc != 0 {
        return Err(ArenaError::Release { os_code: os_code() });
    }
    Ok(())
}

#[cfg(windows)]
pub fn page_size() -> usize {
    use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};

    let mut info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
    unsafe { GetSystemInfo(&mut info) };
    if info.dwPageSize == 0 {
        4096
    } else {
        info.dwPageSize as usize
    }
}

#[cfg(windows)]
pub fn reserve(len: usize) -> Result<*mut u8, ArenaError> {
    use winapi::um::memoryapi::VirtualAlloc;
    use winapi::um::winnt::{MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

    let ptr = unsafe { VirtualAlloc(std::ptr::null_mut(), len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };
    if ptr.is_null() {
        return Err(ArenaError::OutOfMemory { requested: len, os_code: os_code() });
    }
    Ok(ptr as *mut u8)
}

#[cfg(windows)]
pub fn protect_executable(ptr: *mut u8, len: usize) -> Result<(), ArenaError> {
    use winapi::um::memoryapi::VirtualProtect;
    use winapi::um::winnt::PAGE_EXECUTE_READ;

    let mut old = 0;
    let ok = unsafe { VirtualProtect(ptr as *mut _, len, PAGE_EXECUTE_READ, &mut old) };
    if ok == 0 {
        return Err(ArenaError::Protect { os_code: os_code() });
    }
    Ok(())
}

#[cfg(windows)]
pub fn release(ptr: *mut u8, _len: usize) -> Result<(), ArenaError> {
    use winapi::um::memoryapi::VirtualFree;
    use winapi::um::winnt::MEM_RELEASE;

    let ok = unsafe { VirtualFree(ptr as *mut _, 0, MEM_RELEASE) };
    if ok == 0 {
        return Err(ArenaError::Release { os_code: os_code() });
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
pub fn page_size() -> usize {
    4096
}

#[cfg(not(any(unix, windows)))]
pub fn reserve(_len: usize) -> Result<*mut u8, ArenaError> {
    Err(ArenaError::Unsupported)
}

#[cfg(not(any(unix, windows)))]
pub fn protect_executable(_ptr: *mut u8, _len: usize) -> Result<(), ArenaError> {
    Err(ArenaError::Unsupported)
}

#[cfg(not(any(unix, windows)))]
pub fn release(_ptr: *mut u8, _len: usize) -> Result<(), ArenaError> {
    Err(ArenaError::Unsupported)
}

/// Make freshly written code visible to instruction fetch
#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
pub fn flush_icache(ptr: *mut u8, len: usize) {
    extern "C" {
        fn __clear_cache(start: *mut libc::c_char, end: *mut libc::c_char);
    }
    unsafe {
        __clear_cache(ptr as *mut libc::c_char, ptr.add(len) as *mut libc::c_char);
    }
}

#[cfg(all(target_arch = "aarch64", target_vendor = "apple"))]
pub fn flush_icache(ptr: *mut u8, len: usize) {
    extern "C" {
        fn sys_icache_invalidate(start: *mut libc::c_void, len: usize);
    }
    unsafe {
        sys_icache_invalidate(ptr as *mut libc::c_void, len);
    }
}

#[cfg(windows)]
pub fn flush_icache(ptr: *mut u8, len: usize) {
    use winapi::um::processthreadsapi::{FlushInstructionCache, GetCurrentProcess};

    unsafe {
        FlushInstructionCache(GetCurrentProcess(), ptr as *const _, len);
    }
}

/// x86 keeps instruction and data caches coherent
#[cfg(not(any(
    windows,
    all(target_arch = "aarch64", target_os = "linux"),
    all(target_arch = "aarch64", target_vendor = "apple")
)))]
pub fn flush_icache(_ptr: *mut u8, _len: usize) {}
