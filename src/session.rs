use crate::{Error, Result, PAYLOAD_SIZE};
use std::fmt;

/// How one repetition's payload is handed to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One `write(2)` per buffer.
    PerBuffer,
    /// One `writev(2)` over every buffer.
    Vectored,
    /// One `write(2)` over the contiguous payload.
    Single,
}

impl Strategy {
    /// Test type number used on the command line and in the report.
    pub fn number(self) -> u8 {
        match self {
            Strategy::PerBuffer => 1,
            Strategy::Vectored => 2,
            Strategy::Single => 3,
        }
    }
}

impl TryFrom<i64> for Strategy {
    type Error = Error;

    fn try_from(n: i64) -> Result<Self> {
        match n {
            1 => Ok(Strategy::PerBuffer),
            2 => Ok(Strategy::Vectored),
            3 => Ok(Strategy::Single),
            _ => Err(Error::InvalidArguments(format!(
                "strategy must be 1, 2 or 3, got {}",
                n
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::PerBuffer => "per-buffer",
            Strategy::Vectored => "vectored",
            Strategy::Single => "single",
        };
        write!(f, "{}", name)
    }
}

/// Validated client-side parameters; fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    repetitions: u64,
    buffer_count: usize,
    buffer_size: usize,
    strategy: Strategy,
}

impl SessionParams {
    /// Checks the raw command line values against the fixed payload size.
    pub fn new(
        repetitions: i64,
        buffer_count: i64,
        buffer_size: i64,
        strategy: i64,
    ) -> Result<SessionParams> {
        if repetitions <= 0 {
            return Err(Error::InvalidArguments(format!(
                "repetitions must be positive, got {}",
                repetitions
            )));
        }
        if buffer_count <= 0 || buffer_size <= 0 {
            return Err(Error::InvalidArguments(format!(
                "buffer count and size must be positive, got {} x {}",
                buffer_count, buffer_size
            )));
        }
        let total = buffer_count.checked_mul(buffer_size);
        if total != Some(PAYLOAD_SIZE as i64) {
            return Err(Error::InvalidArguments(format!(
                "buffer count x size must be {}, got {} x {}",
                PAYLOAD_SIZE, buffer_count, buffer_size
            )));
        }
        let strategy = Strategy::try_from(strategy)?;

        Ok(SessionParams {
            repetitions: repetitions as u64,
            buffer_count: buffer_count as usize,
            buffer_size: buffer_size as usize,
            strategy,
        })
    }

    pub fn repetitions(&self) -> u64 {
        self.repetitions
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Bytes sent per repetition.
    pub fn payload_size(&self) -> usize {
        self.buffer_count * self.buffer_size
    }
}
