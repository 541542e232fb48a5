use crate::config::ClientConfig;
use crate::handshake;
use crate::metrics::Report;
use crate::raw::RawSocket;
use crate::session::SessionParams;
use crate::transfer::{self, Payload};
use crate::{net, Error, Result};
use log::{debug, info};
use std::io::{Read, Write};

/// Longest count token the server can send back (u64::MAX has 20 digits).
const COUNT_TOKEN_CAPACITY: u64 = 32;

/// Connects, runs one measured session and closes the connection.
pub fn run(config: &ClientConfig) -> Result<Report> {
    let stream = net::connect(&config.host, config.port)?;
    net::set_timeouts(&stream, config.io_timeout)?;
    if config.nodelay {
        stream.set_nodelay(true)?;
    }
    info!(
        "{}:{} connected, {} x {} bytes, {} repetitions, {}",
        config.host,
        config.port,
        config.params.buffer_count(),
        config.params.buffer_size(),
        config.params.repetitions(),
        config.params.strategy()
    );

    let mut socket = RawSocket::from(stream);
    session(&mut socket, &config.params)
}

/// Handshake, timed transfer, then the server's read-call count.
pub fn session<S: Read + Write>(stream: &mut S, params: &SessionParams) -> Result<Report> {
    handshake::announce(stream, params.repetitions())?;

    let payload = Payload::for_session(params);
    let outcome = transfer::run(stream, params, &payload)?;
    let read_calls = read_count(stream)?;
    debug!("server reported {} read calls", read_calls);

    Ok(Report::new(
        params.strategy(),
        params.payload_size(),
        params.repetitions(),
        outcome.elapsed,
        outcome.write_calls,
        read_calls,
    ))
}

/// Reads the count token; the server closes the stream right after it.
fn read_count<S: Read>(stream: &mut S) -> Result<u64> {
    let mut token = Vec::new();
    stream.take(COUNT_TOKEN_CAPACITY).read_to_end(&mut token)?;
    let count = handshake::decode_count(&token)?;
    u64::try_from(count).map_err(|_| {
        Error::InvalidSessionParameters(format!("negative read-call count {}", count))
    })
}
