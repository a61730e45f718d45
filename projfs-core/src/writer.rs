//! Chunked write of a full buffer to a kernel-supplied file descriptor (C3).

use std::os::unix::io::RawFd;

/// Writes every byte of `buf` to `fd`, looping over short writes by advancing the buffer
/// pointer. Returns `false` on any system-level write failure; the kernel fd is borrowed and
/// remains open regardless of outcome — closing it is the driver's responsibility.
pub fn try_write(fd: RawFd, buf: &[u8]) -> bool {
    let mut written = 0usize;

    while written < buf.len() {
        let remaining = &buf[written..];
        let n = unsafe {
            libc::write(
                fd,
                remaining.as_ptr() as *const libc::c_void,
                remaining.len(),
            )
        };

        if n < 0 {
            return false;
        }
        if n == 0 {
            // No progress and no error: treat as a stalled descriptor rather than loop forever.
            return false;
        }

        written += n as usize;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn writes_full_buffer_to_a_pipe() {
        let (mut read_end, write_end) = pipe();
        let data = b"hello projected world".to_vec();

        let fd = write_end.as_raw_fd();
        assert!(try_write(fd, &data));
        drop(write_end);

        let mut out = Vec::new();
        read_end.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn fails_on_closed_descriptor() {
        let (read_end, write_end) = pipe();
        drop(read_end);
        drop(write_end);
        // fd 12345 is very unlikely to be a valid open descriptor in the test process.
        assert!(!try_write(12345, b"x"));
    }

    fn pipe() -> (std::fs::File, std::fs::File) {
        use std::os::unix::io::FromRawFd;
        let mut fds = [0; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        unsafe {
            (
                std::fs::File::from_raw_fd(fds[0]),
                std::fs::File::from_raw_fd(fds[1]),
            )
        }
    }
}
