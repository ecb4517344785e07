//! Metrics collection for pollchain.
//!
//! Process-wide counters for the HTTP surface and the vote engine. The
//! counters are plain atomics; readers take a [`MetricsSnapshot`].

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Application metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    // === Request Metrics ===
    /// Total HTTP requests received
    pub http_requests_total: AtomicU64,
    /// Active HTTP requests
    pub http_requests_active: AtomicU64,
    /// HTTP requests by status code category
    pub http_requests_2xx: AtomicU64,
    pub http_requests_4xx: AtomicU64,
    pub http_requests_5xx: AtomicU64,
    /// Total request latency in microseconds
    pub http_request_latency_us_total: AtomicU64,

    // === Poll Metrics ===
    /// Polls created, including auto-spawned successors
    pub polls_created: AtomicU64,
    /// Polls deleted
    pub polls_deleted: AtomicU64,
    /// Successor polls spawned by the chain manager
    pub successors_spawned: AtomicU64,
    /// Successor polls that could not be created after a recorded vote
    pub successor_failures: AtomicU64,

    // === Vote Metrics ===
    /// Voting events committed
    pub votes_accepted: AtomicU64,
    /// Voting events rejected by a business rule
    pub votes_rejected: AtomicU64,
    /// Attempts discarded because of a storage write conflict
    pub vote_conflicts: AtomicU64,
    /// Votes that ran out of conflict retries
    pub votes_overloaded: AtomicU64,
    /// Total vote latency in microseconds (accepted votes only)
    pub vote_latency_us_total: AtomicU64,

    // === Deadline Metrics ===
    /// Operations aborted by their deadline
    pub timeouts_total: AtomicU64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub http_requests_total: u64,
    pub http_requests_active: u64,
    pub http_requests_2xx: u64,
    pub http_requests_4xx: u64,
    pub http_requests_5xx: u64,
    pub http_request_latency_avg_us: u64,

    pub polls_created: u64,
    pub polls_deleted: u64,
    pub successors_spawned: u64,
    pub successor_failures: u64,

    pub votes_accepted: u64,
    pub votes_rejected: u64,
    pub vote_conflicts: u64,
    pub votes_overloaded: u64,
    pub vote_latency_avg_us: u64,

    pub timeouts_total: u64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_requests_active: AtomicU64::new(0),
            http_requests_2xx: AtomicU64::new(0),
            http_requests_4xx: AtomicU64::new(0),
            http_requests_5xx: AtomicU64::new(0),
            http_request_latency_us_total: AtomicU64::new(0),

            polls_created: AtomicU64::new(0),
            polls_deleted: AtomicU64::new(0),
            successors_spawned: AtomicU64::new(0),
            successor_failures: AtomicU64::new(0),

            votes_accepted: AtomicU64::new(0),
            votes_rejected: AtomicU64::new(0),
            vote_conflicts: AtomicU64::new(0),
            votes_overloaded: AtomicU64::new(0),
            vote_latency_us_total: AtomicU64::new(0),

            timeouts_total: AtomicU64::new(0),
        }
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, status_code: u16, latency: Duration) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);

        match status_code {
            200..=299 => self.http_requests_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.http_requests_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.http_requests_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        self.http_request_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Start tracking an active request.
    pub fn start_request(&self) {
        self.http_requests_active.fetch_add(1, Ordering::Relaxed);
    }

    /// End tracking an active request.
    pub fn end_request(&self) {
        self.http_requests_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a committed voting event.
    pub fn record_vote_accepted(&self, latency: Duration) {
        self.votes_accepted.fetch_add(1, Ordering::Relaxed);
        self.vote_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a vote rejected by a business rule.
    pub fn record_vote_rejected(&self) {
        self.votes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discarded attempt caused by a write conflict.
    pub fn record_vote_conflict(&self) {
        self.vote_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a vote that exhausted its conflict retries.
    pub fn record_vote_overloaded(&self) {
        self.votes_overloaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a created poll.
    pub fn record_poll_created(&self) {
        self.polls_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deleted poll.
    pub fn record_poll_deleted(&self) {
        self.polls_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a successor spawn.
    pub fn record_successor(&self, success: bool) {
        if success {
            self.successors_spawned.fetch_add(1, Ordering::Relaxed);
        } else {
            self.successor_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an operation aborted by its deadline.
    pub fn record_timeout(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests_total: self.http_requests_total.load(Ordering::Relaxed),
            http_requests_active: self.http_requests_active.load(Ordering::Relaxed),
            http_requests_2xx: self.http_requests_2xx.load(Ordering::Relaxed),
            http_requests_4xx: self.http_requests_4xx.load(Ordering::Relaxed),
            http_requests_5xx: self.http_requests_5xx.load(Ordering::Relaxed),
            http_request_latency_avg_us: average(
                &self.http_request_latency_us_total,
                &self.http_requests_total,
            ),

            polls_created: self.polls_created.load(Ordering::Relaxed),
            polls_deleted: self.polls_deleted.load(Ordering::Relaxed),
            successors_spawned: self.successors_spawned.load(Ordering::Relaxed),
            successor_failures: self.successor_failures.load(Ordering::Relaxed),

            votes_accepted: self.votes_accepted.load(Ordering::Relaxed),
            votes_rejected: self.votes_rejected.load(Ordering::Relaxed),
            vote_conflicts: self.vote_conflicts.load(Ordering::Relaxed),
            votes_overloaded: self.votes_overloaded.load(Ordering::Relaxed),
            vote_latency_avg_us: average(&self.vote_latency_us_total, &self.votes_accepted),

            timeouts_total: self.timeouts_total.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::new();

        let counters: [(&str, &str, &str, u64); 12] = [
            ("http_requests_total", "counter", "Total HTTP requests", s.http_requests_total),
            ("http_requests_active", "gauge", "Active HTTP requests", s.http_requests_active),
            ("polls_created_total", "counter", "Polls created", s.polls_created),
            ("polls_deleted_total", "counter", "Polls deleted", s.polls_deleted),
            ("successors_spawned_total", "counter", "Successor polls spawned", s.successors_spawned),
            ("successor_failures_total", "counter", "Successor polls that failed to spawn", s.successor_failures),
            ("votes_accepted_total", "counter", "Voting events committed", s.votes_accepted),
            ("votes_rejected_total", "counter", "Voting events rejected", s.votes_rejected),
            ("vote_conflicts_total", "counter", "Vote attempts discarded by write conflicts", s.vote_conflicts),
            ("votes_overloaded_total", "counter", "Votes that exhausted conflict retries", s.votes_overloaded),
            ("vote_latency_avg_us", "gauge", "Average accepted vote latency", s.vote_latency_avg_us),
            ("timeouts_total", "counter", "Operations aborted by deadline", s.timeouts_total),
        ];

        for (name, kind, help, value) in counters {
            let _ = writeln!(output, "# HELP pollchain_{name} {help}");
            let _ = writeln!(output, "# TYPE pollchain_{name} {kind}");
            let _ = writeln!(output, "pollchain_{name} {value}");
        }

        output.push_str("# HELP pollchain_http_requests_by_status HTTP requests by status\n");
        output.push_str("# TYPE pollchain_http_requests_by_status counter\n");
        for (class, value) in [
            ("2xx", s.http_requests_2xx),
            ("4xx", s.http_requests_4xx),
            ("5xx", s.http_requests_5xx),
        ] {
            let _ = writeln!(
                output,
                "pollchain_http_requests_by_status{{status=\"{class}\"}} {value}"
            );
        }

        output
    }
}

fn average(total: &AtomicU64, count: &AtomicU64) -> u64 {
    let total = total.load(Ordering::Relaxed);
    let count = count.load(Ordering::Relaxed);
    if count > 0 { total / count } else { 0 }
}

/// Simple wall-clock timer.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        let metrics = Metrics::new();

        metrics.record_http_request(200, Duration::from_millis(50));
        metrics.record_http_request(409, Duration::from_millis(10));
        metrics.record_http_request(503, Duration::from_millis(100));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.http_requests_total, 3);
        assert_eq!(snapshot.http_requests_2xx, 1);
        assert_eq!(snapshot.http_requests_4xx, 1);
        assert_eq!(snapshot.http_requests_5xx, 1);
    }

    #[test]
    fn test_active_request_tracking() {
        let metrics = Metrics::new();

        metrics.start_request();
        metrics.start_request();
        assert_eq!(metrics.http_requests_active.load(Ordering::Relaxed), 2);

        metrics.end_request();
        assert_eq!(metrics.http_requests_active.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_vote_counters() {
        let metrics = Metrics::new();

        metrics.record_vote_accepted(Duration::from_micros(100));
        metrics.record_vote_accepted(Duration::from_micros(300));
        metrics.record_vote_conflict();
        metrics.record_vote_rejected();
        metrics.record_vote_overloaded();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.votes_accepted, 2);
        assert_eq!(snapshot.vote_latency_avg_us, 200);
        assert_eq!(snapshot.vote_conflicts, 1);
        assert_eq!(snapshot.votes_rejected, 1);
        assert_eq!(snapshot.votes_overloaded, 1);
    }

    #[test]
    fn test_successor_outcomes() {
        let metrics = Metrics::new();
        metrics.record_successor(true);
        metrics.record_successor(false);
        metrics.record_successor(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.successors_spawned, 1);
        assert_eq!(snapshot.successor_failures, 2);
    }

    #[test]
    fn test_average_latency_empty() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().http_request_latency_avg_us, 0);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_http_request(200, Duration::from_millis(50));
        metrics.record_poll_created();

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("pollchain_http_requests_total 1"));
        assert!(prometheus.contains("pollchain_polls_created_total 1"));
        assert!(prometheus.contains("pollchain_http_requests_by_status{status=\"2xx\"} 1"));
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }
}
