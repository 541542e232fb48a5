//! Repetition count exchange that precedes every measurement.
//!
//! The client sends the count as bare decimal ASCII. The server echoes the
//! exact bytes it read, and the client waits for that echo before it starts
//! the clock.

use crate::{Error, Result};
use log::debug;
use std::io::{self, Read, Write};

/// Client half: sends `repetitions` and blocks until the echo arrives.
///
/// An echo differing from the token means the server decoded a different
/// count, which is reported as [`Error::ProtocolMismatch`].
pub fn announce<S: Read + Write>(stream: &mut S, repetitions: u64) -> Result<()> {
    let token = repetitions.to_string();
    stream.write_all(token.as_bytes())?;

    let mut ack = vec![0u8; token.len()];
    stream.read_exact(&mut ack)?;
    if ack != token.as_bytes() {
        return Err(Error::ProtocolMismatch {
            sent: token,
            acked: String::from_utf8_lossy(&ack).into_owned(),
        });
    }
    debug!("handshake acknowledged: {} repetitions", repetitions);
    Ok(())
}

/// Server half: reads one token of at most `capacity` bytes, validates it
/// and echoes it back verbatim.
///
/// A count that is not a positive integer is rejected before anything is
/// echoed, so the peer sees the stream close.
pub fn receive_announcement<S: Read + Write>(stream: &mut S, capacity: usize) -> Result<u64> {
    let mut buf = vec![0u8; capacity];
    let n = loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed before announcing repetitions",
                )
                .into())
            }
            Ok(n) => break n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };

    let token = &buf[..n];
    let iterations = decode_count(token)?;
    if iterations <= 0 {
        return Err(Error::InvalidSessionParameters(format!(
            "announced repetitions must be positive, got {}",
            iterations
        )));
    }

    stream.write_all(token)?;
    Ok(iterations as u64)
}

/// Parses a bare decimal token as sent on the wire.
pub fn decode_count(token: &[u8]) -> Result<i64> {
    let text = std::str::from_utf8(token)?;
    text.parse::<i64>().map_err(|source| Error::MalformedToken {
        token: text.to_string(),
        source,
    })
}
