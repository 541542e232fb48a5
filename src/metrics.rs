use crate::session::Strategy;
use std::fmt;
use std::time::Duration;

/// Bytes-to-Gb conversion factor applied to the raw byte volume.
pub const CALIBRATION: f64 = 7.451e-9;

/// Observed throughput in Gbps.
///
/// Returns `f64::INFINITY` when the interval rounds down to zero
/// microseconds.
pub fn throughput_gbps(payload_size: usize, repetitions: u64, elapsed_us: u64) -> f64 {
    let volume = payload_size as f64 * repetitions as f64 * CALIBRATION;
    if elapsed_us == 0 {
        return f64::INFINITY;
    }
    volume / (elapsed_us as f64 * 1e-6)
}

/// Result line of one client run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub strategy: Strategy,
    pub elapsed_us: u64,
    pub read_calls: u64,
    pub write_calls: u64,
    pub gbps: f64,
}

impl Report {
    pub fn new(
        strategy: Strategy,
        payload_size: usize,
        repetitions: u64,
        elapsed: Duration,
        write_calls: u64,
        read_calls: u64,
    ) -> Report {
        let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        Report {
            strategy,
            elapsed_us,
            read_calls,
            write_calls,
            gbps: throughput_gbps(payload_size, repetitions, elapsed_us),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Test {}: Time = {} usec #reads = {} Throughput: {} Gbps #writes = {}",
            self.strategy.number(),
            self.elapsed_us,
            self.read_calls,
            self.gbps,
            self.write_calls
        )
    }
}
