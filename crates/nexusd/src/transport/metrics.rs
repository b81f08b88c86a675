//! Per-worker request accounting.

use std::time::{Duration, SystemTime};

use serde::Serialize;

/// Counters owned by one worker process.
#[derive(Debug, Clone)]
pub struct Metrics {
    request_count: u64,
    error_count: u64,
    started_at: SystemTime,
    total_response_time: Duration,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Starts accounting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_count: 0,
            error_count: 0,
            started_at: SystemTime::now(),
            total_response_time: Duration::ZERO,
        }
    }

    /// Counts a successfully received message.
    pub const fn record_request(&mut self) {
        self.request_count = self.request_count.saturating_add(1);
    }

    /// Counts a failed connection.
    pub const fn record_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Adds the latency of one written response.
    pub fn record_response(&mut self, elapsed: Duration) {
        self.total_response_time = self.total_response_time.saturating_add(elapsed);
    }

    /// Messages received so far.
    #[must_use]
    pub const fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Connections that failed so far.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Cumulative response latency.
    #[must_use]
    pub const fn total_response_time(&self) -> Duration {
        self.total_response_time
    }

    /// Mean latency per received request, zero before the first request.
    #[must_use]
    pub fn avg_response_time(&self) -> Duration {
        let total = self.total_response_time.as_nanos();
        let average = total
            .checked_div(u128::from(self.request_count))
            .unwrap_or_default();
        Duration::from_nanos(u64::try_from(average).unwrap_or(u64::MAX))
    }

    /// Serialisable view for logging.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let started_at_unix_secs = self
            .started_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|since| since.as_secs())
            .unwrap_or_default();
        let uptime_secs = self
            .started_at
            .elapsed()
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        MetricsSnapshot {
            request_count: self.request_count,
            error_count: self.error_count,
            started_at_unix_secs,
            uptime_secs,
            total_response_time_micros: duration_micros(self.total_response_time),
            avg_response_time_micros: duration_micros(self.avg_response_time()),
        }
    }
}

fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Messages received.
    pub request_count: u64,
    /// Failed connections.
    pub error_count: u64,
    /// Worker start time as seconds since the Unix epoch.
    pub started_at_unix_secs: u64,
    /// Seconds since the worker started.
    pub uptime_secs: u64,
    /// Cumulative response latency in microseconds.
    pub total_response_time_micros: u64,
    /// Mean response latency in microseconds.
    pub avg_response_time_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn average_is_zero_without_requests() {
        let metrics = Metrics::new();
        assert_eq!(metrics.avg_response_time(), Duration::ZERO);
    }

    #[rstest]
    #[case(&[10, 20, 30])]
    #[case(&[7])]
    #[case(&[1, 1, 1, 1, 6])]
    fn average_matches_total_over_count(#[case] latencies_ms: &[u64]) {
        let mut metrics = Metrics::new();
        for latency in latencies_ms {
            metrics.record_request();
            metrics.record_response(Duration::from_millis(*latency));
        }
        let total: u64 = latencies_ms.iter().sum();
        assert_eq!(metrics.total_response_time(), Duration::from_millis(total));
        assert_eq!(
            metrics.avg_response_time().saturating_mul(
                u32::try_from(latencies_ms.len()).expect("small case")
            ),
            metrics.total_response_time()
        );
    }

    #[test]
    fn errors_do_not_affect_request_count() {
        let mut metrics = Metrics::new();
        metrics.record_error();
        metrics.record_error();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.error_count, 2);
        assert_eq!(snapshot.request_count, 0);
    }
}
