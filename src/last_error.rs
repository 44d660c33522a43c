//! Thread-local error capture
//!
//! Compiled trampolines call [`save_last_error`] straight after the native target returns,
//! so the OS error slot is read before any managed code can disturb it.

use std::cell::Cell;

thread_local! {
    static LAST_ERROR: Cell<i32> = const { Cell::new(0) };
}

/// Copy the OS error slot of the calling thread into the captured cell
pub extern "C" fn save_last_error() {
    let code = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    LAST_ERROR.with(|cell| cell.set(code));
}

/// Error code captured by the most recent capturing call on this thread
#[inline]
pub fn last_error() -> i32 {
    LAST_ERROR.with(Cell::get)
}

#[inline]
pub fn set_last_error(code: i32) {
    LAST_ERROR.with(|cell| cell.set(code));
}

/// Address compilers embed for the capture call
#[inline]
pub fn helper_address() -> usize {
    save_last_error as *const () as usize
}

/// Write the OS error slot directly
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn set_os_error(code: i32) {
    unsafe { *libc::__errno_location() = code };
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn set_os_error(code: i32) {
    unsafe { *libc::__error() = code };
}

#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
pub fn set_os_error(code: i32) {
    unsafe { *libc::__error() = code };
}

#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
pub fn set_os_error(code: i32) {
    unsafe { *libc::__errno() = code };
}

#[cfg(windows)]
pub fn set_os_error(code: i32) {
    unsafe { winapi::um::errhandlingapi::SetLastError(code as u32) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_reads_os_slot() {
        set_os_error(42);
        save_last_error();
        assert_eq!(last_error(), 42);
    }

    #[test]
    fn test_capture_is_thread_local() {
        set_last_error(7);
        let other = std::thread::spawn(last_error).join().expect("thread");
        assert_eq!(other, 0);
        assert_eq!(last_error(), 7);
    }

    #[test]
    fn test_helper_address_is_stable() {
        assert_ne!(helper_address(), 0);
        assert_eq!(helper_address(), helper_address());
    }
}
