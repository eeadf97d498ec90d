//! Path validation and the platform's `PATH_MAX` guard.

/// Returns `true` if `bytes` (the OS-encoded filepath, without its
/// terminating NUL) starts with `/`.
pub fn is_absolute(bytes: &[u8]) -> bool {
    bytes.first() == Some(&b'/')
}

/// Queries the platform's maximum absolute path length.
///
/// On Unix this asks `pathconf("/", _PC_PATH_MAX)`; a handful of exotic
/// filesystems report no limit (`-1` with `errno` unset), in which case we
/// fall back to the common 4096-byte default rather than accepting
/// arbitrarily long handshake paths.
#[cfg(unix)]
pub fn path_max() -> usize {
    use std::ffi::CString;

    const FALLBACK: usize = 4096;
    let root = CString::new("/").expect("no embedded NUL");
    // SAFETY: `root` is a valid NUL-terminated C string and outlives the call.
    let value = unsafe { libc::pathconf(root.as_ptr(), libc::_PC_PATH_MAX) };
    if value > 0 {
        value as usize
    } else {
        FALLBACK
    }
}

#[cfg(not(unix))]
pub fn path_max() -> usize {
    4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(!is_absolute(b"relative/path"));
        assert!(!is_absolute(b""));
    }

    #[test]
    fn accepts_absolute_paths() {
        assert!(is_absolute(b"/tmp/out.log"));
    }

    #[test]
    fn path_max_is_sane() {
        assert!(path_max() >= 255);
    }
}
