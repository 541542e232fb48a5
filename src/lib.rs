//! TCP throughput benchmark: a client that sends a fixed 1500 byte payload
//! with one of three write strategies, and a server that counts the read
//! calls it needs to receive it.

#[macro_use]
mod errors;

pub mod accounting;
pub mod client;
pub mod config;
pub mod handshake;
pub mod metrics;
pub mod net;
pub mod raw;
pub mod server;
pub mod session;
pub mod transfer;

pub use errors::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Bytes exchanged per repetition.
pub const PAYLOAD_SIZE: usize = 1500;

/// Default pending connection queue length of the server.
pub const BACKLOG: i32 = 5;
