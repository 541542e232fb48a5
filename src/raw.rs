//! Owned socket descriptor whose every `read`/`write`/`write_vectored`
//! maps onto exactly one system call.
//!
//! Read accounting depends on that: one invocation here is one `read(2)`.

use crate::errors::libc_errno;
use std::io::{self, IoSlice, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::IntoRawFd;

/// Upper bound on descriptors handed to a single `writev(2)`; Linux and
/// macOS both reject more than this with EINVAL.
pub const MAX_IOVECS: usize = 1024;

#[derive(Debug)]
pub struct RawSocket(pub(crate) libc::c_int);

impl RawSocket {
    /// Gives the descriptor back without closing it.
    pub(crate) fn into_raw(self) -> libc::c_int {
        let fd = self.0;
        std::mem::forget(self);
        fd
    }
}

impl From<TcpStream> for RawSocket {
    fn from(stream: TcpStream) -> Self {
        RawSocket(stream.into_raw_fd())
    }
}

impl Read for RawSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        inner_read(self.0, buf)
    }
}

impl Write for RawSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        inner_write(self.0, buf)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        inner_writev(self.0, bufs)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

fn inner_read(fd: libc::c_int, buf: &mut [u8]) -> io::Result<usize> {
    unsafe {
        let n = libc::read(fd, buf.as_mut_ptr() as _, buf.len() as _);
        if n == -1 {
            return Err(io::Error::from_raw_os_error(libc_errno() as _));
        }
        Ok(n as _)
    }
}

fn inner_write(fd: libc::c_int, buf: &[u8]) -> io::Result<usize> {
    unsafe {
        let n = libc::write(fd, buf.as_ptr() as _, buf.len() as _);
        if n == -1 {
            return Err(io::Error::from_raw_os_error(libc_errno() as _));
        }
        Ok(n as _)
    }
}

fn inner_writev(fd: libc::c_int, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
    // IoSlice is ABI compatible with iovec on unix
    let count = bufs.len().min(MAX_IOVECS);
    unsafe {
        let n = libc::writev(fd, bufs.as_ptr() as *const libc::iovec, count as _);
        if n == -1 {
            return Err(io::Error::from_raw_os_error(libc_errno() as _));
        }
        Ok(n as _)
    }
}
