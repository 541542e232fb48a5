//! Accept loop handing every connection to its own worker thread.

use crate::accounting::{self, ReadTally};
use crate::config::ServerConfig;
use crate::raw::RawSocket;
use crate::{handshake, net, Error, Result};
use log::{debug, error, info, warn};
use std::io::{self, Read, Write};
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    local_addr: SocketAddr,
    stopped: Arc<AtomicBool>,
}

/// Stops a running [`Server`] from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    addr: SocketAddr,
    stopped: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // wake the blocked accept; the loop drops this connection
        if let Err(err) = TcpStream::connect(self.addr) {
            warn!("cannot wake accept loop on {}: {}", self.addr, err);
        }
    }
}

impl Server {
    pub fn bind(config: ServerConfig) -> Result<Server> {
        let listener = net::listen(config.listen, config.backlog)?;
        let local_addr = listener.local_addr()?;
        info!(
            "listening on {}, backlog {}, {} bytes per repetition",
            local_addr, config.backlog, config.payload_size
        );
        Ok(Server {
            listener,
            config: Arc::new(config),
            local_addr,
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            addr: wake_addr(self.local_addr),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Accepts until shut down. Workers already running are left to finish
    /// on their own.
    pub fn run(self) -> Result<()> {
        let mut next_id: u64 = 0;
        let config = &self.config;
        accept_loop(&self.listener, &self.stopped, |stream, peer| {
            next_id += 1;
            let id = next_id;
            let config = Arc::clone(config);
            let spawned = thread::Builder::new()
                .name(format!("tput-worker-{}", id))
                .spawn(move || {
                    match prepare(stream, &config).and_then(|mut s| serve(&mut s, &config)) {
                        Ok(tally) => debug!(
                            "worker {} ({}) done: {} repetitions, {} read calls",
                            id, peer, tally.repetitions, tally.read_calls
                        ),
                        Err(err) => warn!("worker {} ({}) failed: {}", id, peer, err),
                    }
                });
            if let Err(err) = spawned {
                error!("cannot spawn worker for {}: {}", peer, err);
            }
        });
        info!("accept loop on {} stopped", self.local_addr);
        Ok(())
    }
}

/// Source of accepted connections.
trait Accept {
    fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

impl Accept for TcpListener {
    fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self)
    }
}

/// Pause after an accept failure that will not clear by retrying at once.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.raw_os_error() {
        Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOBUFS) | Some(libc::ENOMEM) => {
            Some(ACCEPT_BACKOFF)
        }
        _ => None,
    }
}

fn accept_loop<A, F>(listener: &A, stopped: &AtomicBool, mut on_conn: F)
where
    A: Accept,
    F: FnMut(TcpStream, SocketAddr),
{
    loop {
        let accepted = listener.accept();
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        match accepted {
            Ok((stream, peer)) => on_conn(stream, peer),
            Err(err) => {
                error!("accept failed: {}", err);
                if let Some(pause) = accept_backoff(&err) {
                    thread::sleep(pause);
                }
            }
        }
    }
}

fn prepare(stream: TcpStream, config: &ServerConfig) -> Result<RawSocket> {
    net::set_timeouts(&stream, config.io_timeout)?;
    Ok(RawSocket::from(stream))
}

/// Runs one connection: handshake, read accounting, then the read-call
/// count back as decimal text. The caller drops the stream afterwards.
pub fn serve<S: Read + Write>(stream: &mut S, config: &ServerConfig) -> Result<ReadTally> {
    let iterations = handshake::receive_announcement(stream, config.payload_size)?;
    debug!("peer announced {} repetitions", iterations);

    let tally = accounting::count_reads(stream, iterations, config.payload_size)?;
    stream.write_all(tally.read_calls.to_string().as_bytes())?;
    Ok(tally)
}

/// Address a loopback connect can reach when bound to a wildcard.
fn wake_addr(local: SocketAddr) -> SocketAddr {
    match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local.port())
        }
        _ => local,
    }
}

/// Blocks SIGINT and SIGTERM in the calling thread and everything it
/// spawns afterwards, and shuts `handle` down once either arrives.
///
/// Call before any other thread is started. The returned thread exits
/// after the first signal.
pub fn shutdown_on_signals(handle: ShutdownHandle) -> Result<JoinHandle<()>> {
    let set = unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, ptr::null_mut());
        if rc != 0 {
            let msg = crate::errors::strerror(rc)?;
            return Err(Error::Errno(rc, format!("pthread_sigmask: {}", msg)));
        }
        set
    };

    let waiter = thread::Builder::new()
        .name("tput-signals".into())
        .spawn(move || {
            let mut sig: libc::c_int = 0;
            let rc = unsafe { libc::sigwait(&set, &mut sig) };
            if rc != 0 {
                error!("sigwait failed: {}", rc);
                return;
            }
            info!("signal {} received, shutting down", sig);
            handle.shutdown();
        })?;
    Ok(waiter)
}
