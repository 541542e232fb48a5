//! Connection setup: resolve-and-connect for the client, bind/listen with
//! an explicit backlog for the server.

use crate::raw::RawSocket;
use crate::{Error, Result};
use log::debug;
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::FromRawFd;
use std::time::Duration;

/// Resolves `host:port` and connects to the first address that accepts.
pub fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| Error::AddressResolution {
            host: host.to_string(),
            port,
            source,
        })?
        .collect::<Vec<_>>();
    if addrs.is_empty() {
        return Err(Error::AddressResolution {
            host: host.to_string(),
            port,
            source: io::Error::new(io::ErrorKind::NotFound, "no address found"),
        });
    }

    let mut last = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                debug!("connected to {}", addr);
                return Ok(stream);
            }
            Err(err) => {
                debug!("connect to {} failed: {}", addr, err);
                last = Some(err);
            }
        }
    }
    Err(Error::Connection {
        host: host.to_string(),
        port,
        source: last.unwrap_or_else(|| io::ErrorKind::ConnectionRefused.into()),
    })
}

/// Applies the per-operation timeout to both directions.
pub fn set_timeouts(stream: &TcpStream, timeout: Option<Duration>) -> Result<()> {
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(())
}

/// Binds `addr` with SO_REUSEADDR and starts listening with `backlog`
/// pending connections.
pub fn listen(addr: SocketAddr, backlog: i32) -> Result<TcpListener> {
    bind_raw(addr, backlog).map_err(|err| err.into_bind(addr))
}

fn bind_raw(addr: SocketAddr, backlog: i32) -> Result<TcpListener> {
    let (storage, len) = sockaddr(&addr);
    unsafe {
        let fd = libc::socket(storage.ss_family as libc::c_int, sock_type(), 0);
        if fd == -1 {
            return_errno!("socket");
        }
        // closes the descriptor on every early return
        let sock = RawSocket(fd);
        set_cloexec(fd)?;

        let on: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &on as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) == -1
        {
            return_errno!("setsockopt");
        }

        if libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) == -1 {
            return_errno!("bind");
        }

        if libc::listen(fd, backlog) == -1 {
            return_errno!("listen");
        }

        Ok(TcpListener::from_raw_fd(sock.into_raw()))
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        fn sock_type() -> libc::c_int {
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC
        }

        fn set_cloexec(_fd: libc::c_int) -> Result<()> {
            Ok(())
        }
    } else {
        fn sock_type() -> libc::c_int {
            libc::SOCK_STREAM
        }

        fn set_cloexec(fd: libc::c_int) -> Result<()> {
            unsafe {
                if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) == -1 {
                    return_errno!("fcntl");
                }
            }
            Ok(())
        }
    }
}

fn sockaddr(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    unsafe {
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        let len = match addr {
            SocketAddr::V4(v4) => {
                let sin = &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in);
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                };
                mem::size_of::<libc::sockaddr_in>()
            }
            SocketAddr::V6(v6) => {
                let sin6 = &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6);
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                };
                sin6.sin6_scope_id = v6.scope_id();
                mem::size_of::<libc::sockaddr_in6>()
            }
        };
        (storage, len as libc::socklen_t)
    }
}
