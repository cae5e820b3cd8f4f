//! Per-client request counters exposed as point-in-time snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Result class of one HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestOutcome {
    /// Any response, 2xx or not, was received.
    Completed { status: u16 },
    Timeout,
    Transport,
}

#[derive(Debug, Default)]
pub(crate) struct HttpMetrics {
    requests: AtomicU64,
    non_success_statuses: AtomicU64,
    timeouts: AtomicU64,
    transport_errors: AtomicU64,
    latency_ns: AtomicU64,
}

impl HttpMetrics {
    pub(crate) fn record(&self, outcome: RequestOutcome, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);

        let counter = match outcome {
            RequestOutcome::Completed { status } if (200..300).contains(&status) => return,
            RequestOutcome::Completed { .. } => &self.non_success_statuses,
            RequestOutcome::Timeout => &self.timeouts,
            RequestOutcome::Transport => &self.transport_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HttpMetricsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let non_success_statuses = self.non_success_statuses.load(Ordering::Relaxed);
        let timeouts = self.timeouts.load(Ordering::Relaxed);
        let transport_errors = self.transport_errors.load(Ordering::Relaxed);
        let failures = non_success_statuses + timeouts + transport_errors;

        let (average_latency_ms, failure_rate) = if requests == 0 {
            (0.0, 0.0)
        } else {
            let latency_ns = self.latency_ns.load(Ordering::Relaxed) as f64;
            (
                latency_ns / requests as f64 / 1_000_000.0,
                failures as f64 / requests as f64,
            )
        };

        HttpMetricsSnapshot {
            requests,
            non_success_statuses,
            timeouts,
            transport_errors,
            average_latency_ms,
            failure_rate,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct HttpMetricsSnapshot {
    pub requests: u64,
    pub non_success_statuses: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub average_latency_ms: f64,
    pub failure_rate: f64,
}
