//! Server-side read accounting.
//!
//! Every read invocation is counted, including interrupted and short ones:
//! the count is the quantity being measured.

use crate::Result;
use log::{debug, warn};
use std::io::{self, Read};

/// Totals for one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadTally {
    pub repetitions: u64,
    pub read_calls: u64,
    pub bytes: u64,
}

/// Reads `iterations` repetitions of exactly `payload_size` bytes each.
///
/// A single read never asks for more than what is left of the current
/// repetition. End of stream before the last byte and any I/O error other
/// than `Interrupted` end the loop with [`crate::Error::Stream`].
pub fn count_reads<R: Read>(reader: &mut R, iterations: u64, payload_size: usize) -> Result<ReadTally> {
    let mut buf = vec![0u8; payload_size];
    let mut tally = ReadTally::default();

    for i in 1..=iterations {
        let mut received = 0usize;
        while received < payload_size {
            tally.read_calls += 1;
            match reader.read(&mut buf[..payload_size - received]) {
                Ok(0) => {
                    warn!(
                        "peer closed in repetition {}/{} after {} bytes, {} read calls",
                        i, iterations, received, tally.read_calls
                    );
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("stream ended in repetition {} of {}", i, iterations),
                    )
                    .into());
                }
                Ok(n) => received += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!(
                        "read failed in repetition {}/{} after {} read calls: {}",
                        i, iterations, tally.read_calls, err
                    );
                    return Err(err.into());
                }
            }
        }
        tally.bytes += received as u64;
        tally.repetitions = i;
    }

    debug!(
        "accounted {} repetitions, {} bytes, {} read calls",
        tally.repetitions, tally.bytes, tally.read_calls
    );
    Ok(tally)
}
