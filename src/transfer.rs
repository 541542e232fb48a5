//! Client-side transfer loop for the three write strategies.

use crate::session::{SessionParams, Strategy};
use crate::Result;
use log::debug;
use std::io::{self, IoSlice, Write};
use std::time::{Duration, Instant};

/// The zero-filled buffers sent every repetition.
///
/// Buffers live back to back in one allocation so that the single-write
/// strategy really is one contiguous write.
#[derive(Debug, Clone)]
pub struct Payload {
    data: Vec<u8>,
    buffer_size: usize,
}

impl Payload {
    /// Callers guarantee `buffer_size > 0`; validated parameters always do.
    fn zeroed(buffer_count: usize, buffer_size: usize) -> Payload {
        Payload {
            data: vec![0; buffer_count * buffer_size],
            buffer_size,
        }
    }

    pub fn for_session(params: &SessionParams) -> Payload {
        Self::zeroed(params.buffer_count(), params.buffer_size())
    }

    pub fn buffers(&self) -> std::slice::Chunks<'_, u8> {
        self.data.chunks(self.buffer_size)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// One scatter-gather descriptor per buffer.
    pub fn io_slices(&self) -> Vec<IoSlice<'_>> {
        self.buffers().map(IoSlice::new).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }
}

/// What the transfer loop observed on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Wall-clock time from the first write of the first repetition to the
    /// completion of the last one.
    pub elapsed: Duration,
    /// Write system calls issued, retries after short writes included.
    pub write_calls: u64,
    pub bytes: u64,
}

/// Sends `params.repetitions()` copies of `payload` using the session's
/// strategy. The handshake must already have completed.
pub fn run<W: Write>(
    writer: &mut W,
    params: &SessionParams,
    payload: &Payload,
) -> Result<TransferOutcome> {
    let mut remaining = params.repetitions();
    let mut write_calls = 0u64;

    let elapsed = match params.strategy() {
        Strategy::PerBuffer => {
            let start = Instant::now();
            while remaining > 0 {
                for buf in payload.buffers() {
                    write_fully(writer, buf, &mut write_calls)?;
                }
                remaining -= 1;
            }
            start.elapsed()
        }
        Strategy::Vectored => {
            // descriptors and the short-write scratch list are built
            // outside the measured interval
            let slices = payload.io_slices();
            let mut scratch = Vec::with_capacity(slices.len());
            let start = Instant::now();
            while remaining > 0 {
                write_vectored_fully(
                    writer,
                    &slices,
                    &mut scratch,
                    payload.len(),
                    &mut write_calls,
                )?;
                remaining -= 1;
            }
            start.elapsed()
        }
        Strategy::Single => {
            let start = Instant::now();
            while remaining > 0 {
                write_fully(writer, payload.as_bytes(), &mut write_calls)?;
                remaining -= 1;
            }
            start.elapsed()
        }
    };

    let bytes = params.repetitions() * payload.len() as u64;
    debug!(
        "{} transfer done: {} bytes in {:?}, {} write calls",
        params.strategy(),
        bytes,
        elapsed,
        write_calls
    );
    Ok(TransferOutcome {
        elapsed,
        write_calls,
        bytes,
    })
}

/// Writes all of `buf`, issuing further calls after short writes.
fn write_fully<W: Write>(writer: &mut W, mut buf: &[u8], calls: &mut u64) -> io::Result<()> {
    while !buf.is_empty() {
        *calls += 1;
        match writer.write(buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Gathers `slices` (summing to `total` bytes) in as few vectored calls as
/// the writer allows. After a short write the rest is sent from `scratch`.
fn write_vectored_fully<'a, W: Write>(
    writer: &mut W,
    slices: &[IoSlice<'a>],
    scratch: &mut Vec<IoSlice<'a>>,
    total: usize,
    calls: &mut u64,
) -> io::Result<()> {
    let written = loop {
        *calls += 1;
        match writer.write_vectored(slices) {
            Ok(0) if total > 0 => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => break n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    };
    if written == total {
        return Ok(());
    }

    // finish on the scratch copy so `slices` stays reusable
    scratch.clear();
    scratch.extend_from_slice(slices);
    let mut bufs = &mut scratch[..];
    IoSlice::advance_slices(&mut bufs, written);
    while !bufs.is_empty() {
        *calls += 1;
        match writer.write_vectored(bufs) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => IoSlice::advance_slices(&mut bufs, n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
