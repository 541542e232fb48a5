//! Command line surface and the resolved configuration of both binaries.

use crate::session::SessionParams;
use crate::{Result, BACKLOG, PAYLOAD_SIZE};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// tput-client <host> <port> <repetitions> <buffer-count> <buffer-size> <strategy>
#[derive(Parser, Debug)]
#[command(name = "tput-client", version)]
#[command(about = "Measure TCP write throughput against a tput-server", long_about = None)]
pub struct ClientArgs {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Number of times the 1500 byte payload is sent
    #[arg(allow_negative_numbers = true)]
    pub repetitions: i64,

    /// Number of buffers the payload is split into
    #[arg(allow_negative_numbers = true)]
    pub buffer_count: i64,

    /// Size of each buffer in bytes
    #[arg(allow_negative_numbers = true)]
    pub buffer_size: i64,

    /// 1 = one write per buffer, 2 = writev, 3 = one write
    #[arg(allow_negative_numbers = true)]
    pub strategy: i64,

    /// Per-operation socket timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Disable Nagle's algorithm on the connection
    #[arg(long)]
    pub nodelay: bool,
}

/// tput-server <port>
#[derive(Parser, Debug)]
#[command(name = "tput-server", version)]
#[command(about = "Count the read calls needed to receive tput-client payloads", long_about = None)]
pub struct ServerArgs {
    /// Port to listen on
    pub port: u16,

    /// Local address to bind
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Pending connection queue length
    #[arg(long, default_value_t = BACKLOG)]
    pub backlog: i32,

    /// Per-operation socket timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Everything the client needs once arguments are validated.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub params: SessionParams,
    pub io_timeout: Option<Duration>,
    pub nodelay: bool,
}

impl ClientArgs {
    pub fn into_config(self) -> Result<ClientConfig> {
        let params = SessionParams::new(
            self.repetitions,
            self.buffer_count,
            self.buffer_size,
            self.strategy,
        )?;
        Ok(ClientConfig {
            host: self.host,
            port: self.port,
            params,
            io_timeout: timeout(self.timeout_ms),
            nodelay: self.nodelay,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub backlog: i32,
    /// Bytes per repetition; also the capacity of the worker's read buffer.
    pub payload_size: usize,
    pub io_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn new(listen: SocketAddr) -> ServerConfig {
        ServerConfig {
            listen,
            backlog: BACKLOG,
            payload_size: PAYLOAD_SIZE,
            io_timeout: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        ServerConfig {
            backlog: args.backlog,
            io_timeout: timeout(args.timeout_ms),
            ..ServerConfig::new(SocketAddr::new(args.bind, args.port))
        }
    }
}

fn timeout(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|&ms| ms > 0).map(Duration::from_millis)
}
