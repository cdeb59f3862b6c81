//! Per-comparison timing and counting.
//!
//! One `Metrics` value belongs to exactly one comparison: it is created with
//! the `Comparison` and dropped with it, so concurrent comparisons can never
//! observe each other's counters. Atomics are only for the fan-out inside a
//! round.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::orchestrator::Stage;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for one comparison.
#[derive(Debug)]
pub struct Metrics {
    /// Requests handed to the dispatcher
    pub requests_dispatched: AtomicU64,

    /// Rounds that failed
    pub failures: AtomicU64,

    /// Comparison start
    start_time: Instant,

    // Per-stage timing (microseconds)
    rotate_us: AtomicU64,
    detect_us: AtomicU64,
    encode_us: AtomicU64,
    score_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests_dispatched: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            start_time: Instant::now(),
            rotate_us: AtomicU64::new(0),
            detect_us: AtomicU64::new(0),
            encode_us: AtomicU64::new(0),
            score_us: AtomicU64::new(0),
        })
    }

    /// Record requests handed to the dispatcher.
    pub fn add_requests(&self, count: u64) {
        self.requests_dispatched.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failed round.
    pub fn add_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent in a stage.
    pub fn add_stage_time(&self, stage: Stage, duration: Duration) {
        let counter = match stage {
            Stage::Rotate => &self.rotate_us,
            Stage::Detect => &self.detect_us,
            Stage::Encode => &self.encode_us,
            Stage::Score => &self.score_us,
        };
        counter.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Elapsed time since the comparison started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            rotate_secs: self.rotate_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            detect_secs: self.detect_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            encode_secs: self.encode_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            score_secs: self.score_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of one comparison's metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_dispatched: u64,
    pub failures: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub rotate_secs: f64,
    pub detect_secs: f64,
    pub encode_secs: f64,
    pub score_secs: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Requests: {} | Failures: {} | Elapsed: {:.3}s | \
             Rotate {:.3}s | Detect {:.3}s | Encode {:.3}s | Score {:.3}s",
            self.requests_dispatched,
            self.failures,
            self.elapsed.as_secs_f64(),
            self.rotate_secs,
            self.detect_secs,
            self.encode_secs,
            self.score_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counting() {
        let metrics = Metrics::new();
        metrics.add_requests(6);
        metrics.add_requests(8);
        assert_eq!(metrics.snapshot().requests_dispatched, 14);
    }

    #[test]
    fn test_stage_timing() {
        let metrics = Metrics::new();
        metrics.add_stage_time(Stage::Rotate, Duration::from_millis(100));
        metrics.add_stage_time(Stage::Detect, Duration::from_millis(50));

        let snapshot = metrics.snapshot();
        assert!((snapshot.rotate_secs - 0.1).abs() < 0.001);
        assert!((snapshot.detect_secs - 0.05).abs() < 0.001);
        assert_eq!(snapshot.encode_secs, 0.0);
    }

    #[test]
    fn test_snapshot_display() {
        let metrics = Metrics::new();
        metrics.add_requests(16);
        metrics.add_failure();

        let display = format!("{}", metrics.snapshot());
        assert!(display.contains("Requests: 16"));
        assert!(display.contains("Failures: 1"));
    }
}
