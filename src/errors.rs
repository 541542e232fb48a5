use crate::Result;
use std::ffi::CStr;
use std::io;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::str::Utf8Error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid session parameters: {0}")]
    InvalidSessionParameters(String),

    #[error("cannot resolve {host}:{port}: {source}")]
    AddressResolution {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("connection to {host}:{port} failed: {source}")]
    Connection {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("bind to {addr} failed, errno: {errno}, msg: {msg}")]
    Bind {
        addr: SocketAddr,
        errno: libc::c_int,
        msg: String,
    },

    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    #[error("protocol mismatch: sent {sent:?}, acknowledged {acked:?}")]
    ProtocolMismatch { sent: String, acked: String },

    #[error("malformed token {token:?}: {source}")]
    MalformedToken {
        token: String,
        source: ParseIntError,
    },

    #[error("errno: {0}, msg: {1}")]
    Errno(libc::c_int, String),

    #[error("UTF8 string error: {0}")]
    Utf8(#[from] Utf8Error),
}

impl Error {
    /// Re-tags a raw libc failure raised while setting up a listener.
    pub(crate) fn into_bind(self, addr: SocketAddr) -> Error {
        match self {
            Error::Errno(errno, msg) => Error::Bind { addr, errno, msg },
            other => other,
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        pub(crate) fn libc_errno() -> libc::c_int {
            unsafe { *libc::__errno_location() }
        }
    } else if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))] {
        pub(crate) fn libc_errno() -> libc::c_int {
            unsafe { *libc::__error() }
        }
    } else {
        pub(crate) fn libc_errno() -> libc::c_int {
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        }
    }
}

pub(crate) fn strerror(errno: i32) -> Result<String> {
    unsafe {
        let cstr = CStr::from_ptr(libc::strerror(errno as _));
        Ok(cstr.to_str()?.to_string())
    }
}

macro_rules! return_errno {
    ($msg: expr) => {{
        let errno = $crate::errors::libc_errno();
        return Err($crate::Error::Errno(
            errno,
            format!("{}: {}", $msg, $crate::errors::strerror(errno)?),
        ));
    }};

    () => {
        let errno = $crate::errors::libc_errno();
        return Err($crate::Error::Errno(
            errno,
            $crate::errors::strerror(errno)?,
        ));
    };
}
