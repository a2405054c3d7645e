use std::time::{Duration, Instant};

/// Percentage of `sent` over `total`, clamped to `0.0..=100.0`.
///
/// A zero-byte total counts as complete.
pub fn percent_of(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (sent.min(total) as f64 / total as f64) * 100.0
}

/// Converts a running byte total into percentage and throughput.
///
/// The counter never moves backwards and never passes `total`, so repeated
/// or overlapping transport reports cannot push the percentage above 100.
#[derive(Debug, Clone)]
pub struct ProgressMeter {
    total: u64,
    sent: u64,
    started: Instant,
}

impl ProgressMeter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            sent: 0,
            started: Instant::now(),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Adds `delta` bytes. Returns the number of bytes actually applied.
    pub fn advance(&mut self, delta: u64) -> u64 {
        let applied = delta.min(self.total - self.sent);
        self.sent += applied;
        applied
    }

    /// Moves the counter to an absolute position reported by a transport.
    ///
    /// Positions at or behind the current one are ignored. Returns the delta.
    pub fn advance_to(&mut self, cumulative: u64) -> u64 {
        self.advance(cumulative.saturating_sub(self.sent))
    }

    pub fn percent(&self) -> f64 {
        percent_of(self.sent, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.sent >= self.total
    }

    /// Average throughput since the meter was created.
    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = self.started.elapsed();
        if elapsed.is_zero() {
            return 0.0;
        }
        self.sent as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to finish at the current average rate.
    ///
    /// Returns `None` while nothing has been sent.
    pub fn eta(&self) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        let remaining = (self.total - self.sent) as f64;
        Some(Duration::from_secs_f64(remaining / speed))
    }
}
