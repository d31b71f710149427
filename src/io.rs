use std::ffi::CStr;
use std::io;
use std::os::unix::io::RawFd;

/// Owns a raw file descriptor and closes it when dropped, whichever way the
/// owning scope exits.
#[derive(Debug)]
pub struct ScopedFd(RawFd);

impl ScopedFd {
    pub fn open(path: &CStr) -> io::Result<ScopedFd> {
        loop {
            let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
            if fd >= 0 {
                return Ok(ScopedFd(fd));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for ScopedFd {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe { libc::close(self.0) };
        }
    }
}

/// Positional read that retries on EINTR and keeps going through short
/// reads. Returns the number of bytes delivered, which is less than
/// `buf.len()` only at end of file.
pub fn read_at(fd: RawFd, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut total = 0usize;
    while total < buf.len() {
        let rest = &mut buf[total..];
        let n = unsafe {
            libc::pread64(
                fd,
                rest.as_mut_ptr().cast::<libc::c_void>(),
                rest.len(),
                (offset + total as u64) as libc::off64_t,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if n == 0 {
            break;
        }
        total += n as usize;
    }
    Ok(total)
}

pub fn read_exact_at(fd: RawFd, buf: &mut [u8], offset: u64) -> io::Result<()> {
    if read_at(fd, buf, offset)? == buf.len() {
        Ok(())
    } else {
        Err(io::ErrorKind::UnexpectedEof.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    use std::path::PathBuf;

    fn temp(name: &str, contents: &[u8]) -> (ScopedFd, PathBuf) {
        let path = std::env::temp_dir().join(format!("sigsym-io-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
        (ScopedFd::open(&cpath).unwrap(), path)
    }

    #[test]
    fn reads_at_offsets() {
        let (fd, path) = temp("offsets", b"hello world");
        let mut buf = [0u8; 5];
        assert_eq!(read_at(fd.as_raw_fd(), &mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn short_read_at_eof() {
        let (fd, path) = temp("short", b"hello world");
        let mut buf = [0u8; 32];
        assert_eq!(read_at(fd.as_raw_fd(), &mut buf, 0).unwrap(), 11);
        assert_eq!(&buf[..11], b"hello world");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn exact_read_rejects_eof() {
        let (fd, path) = temp("exact", b"abc");
        let mut buf = [0u8; 8];
        let err = read_exact_at(fd.as_raw_fd(), &mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(ScopedFd::open(c"/sigsym-does-not-exist").is_err());
    }
}
