use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Running response-time statistics for one target.
///
/// Constant memory: only count, total, max and min are kept. The owning
/// monitor clears the window on its log cadence; nothing else touches it.
#[derive(Debug, Clone)]
pub struct ResponseStats {
    start: Instant,
    sample_count: u32,
    total_response_time: Duration,
    max_response_time: Duration,
    min_response_time: Duration,
}

impl ResponseStats {
    /// Opens an empty stats window starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            sample_count: 0,
            total_response_time: Duration::ZERO,
            max_response_time: Duration::ZERO,
            min_response_time: Duration::ZERO,
        }
    }

    /// Records one probe's elapsed time.
    pub fn add(&mut self, elapsed: Duration) {
        self.sample_count += 1;
        self.total_response_time += elapsed;
        if elapsed > self.max_response_time {
            self.max_response_time = elapsed;
        }
        // A zero min means "no samples yet", not a measured zero.
        if self.min_response_time.is_zero() || elapsed < self.min_response_time {
            self.min_response_time = elapsed;
        }
    }

    /// Average response time since the last clear, or `None` before the
    /// first sample.
    pub fn average(&self) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }
        Some(self.total_response_time / self.sample_count)
    }

    /// Resets all counters and restarts the window at now. Idempotent.
    pub fn clear(&mut self) {
        self.start = Instant::now();
        self.sample_count = 0;
        self.total_response_time = Duration::ZERO;
        self.max_response_time = Duration::ZERO;
        self.min_response_time = Duration::ZERO;
    }

    /// Age of the current stats window.
    pub fn window_age(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for ResponseStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResponseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.average() {
            Some(avg) => write!(
                f,
                "Stats: count:{}, avgResponse:{avg:?}, maxResponse:{:?}, minResponse:{:?}",
                self.sample_count, self.max_response_time, self.min_response_time
            ),
            None => write!(f, "Stats: count:0"),
        }
    }
}
