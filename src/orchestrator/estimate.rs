//! Up-front run estimate

use std::fmt;
use std::time::Duration;

use crate::keys;

/// Worker count, chunk size and expected wall-clock time of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunEstimate {
    /// Keys left to process
    pub remaining: usize,

    /// Workers that will be spawned
    pub thread_count: usize,

    /// Keys per worker (the last one takes the remainder)
    pub chunk_size: usize,

    pub estimated_duration: Duration,
}

impl RunEstimate {
    /// Estimate a run over `remaining` keys
    ///
    /// The worker count is clamped to the number of keys; the duration assumes
    /// every worker sustains `per_thread_per_sec` remote calls per second.
    pub fn compute(remaining: usize, configured_threads: usize, per_thread_per_sec: f64) -> Self {
        let thread_count = configured_threads.min(remaining).max(1);
        let chunk_size = keys::chunk_size(remaining, thread_count);

        let secs = if per_thread_per_sec > 0.0 {
            remaining as f64 / thread_count as f64 / per_thread_per_sec
        } else {
            0.0
        };

        Self {
            remaining,
            thread_count,
            chunk_size,
            estimated_duration: Duration::from_secs_f64(secs),
        }
    }

    /// Duration as `H:MM:SS`
    pub fn formatted_duration(&self) -> String {
        format_duration(self.estimated_duration)
    }
}

impl fmt::Display for RunEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} threads, {} files per thread, approximately {}",
            self.thread_count,
            self.chunk_size,
            self.formatted_duration()
        )
    }
}

/// `H:MM:SS`, fractional seconds dropped
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs_f64(59.9)), "0:00:59");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 5 * 60 + 7)), "3:05:07");
        assert_eq!(format_duration(Duration::from_secs(30 * 3600)), "30:00:00");
    }

    #[test]
    fn test_estimate_restore_rate() {
        // 36_000 keys, 2 threads, 5 per second each: one hour
        let estimate = RunEstimate::compute(36_000, 2, 5.0);
        assert_eq!(estimate.thread_count, 2);
        assert_eq!(estimate.chunk_size, 18_000);
        assert_eq!(estimate.formatted_duration(), "1:00:00");
    }

    #[test]
    fn test_threads_clamped_to_remaining() {
        let estimate = RunEstimate::compute(3, 16, 14.0);
        assert_eq!(estimate.thread_count, 3);
        assert_eq!(estimate.chunk_size, 1);
    }

    #[test]
    fn test_chunk_size_floors() {
        let estimate = RunEstimate::compute(10, 3, 5.0);
        assert_eq!(estimate.thread_count, 3);
        assert_eq!(estimate.chunk_size, 3);
    }
}
