use crate::engine::outcome::{CycleOutcome, CycleReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Cumulative counters describing what the engine has done since start-up.
#[derive(Default, Debug)]
pub struct Telemetry {
    full_cycles: AtomicU64,
    minimal_cycles: AtomicU64,
    failed_cycles: AtomicU64,
    feed_errors: AtomicU64,
    records_enqueued: AtomicU64,
    records_blocked: AtomicU64,
    records_settled: AtomicU64,
    records_skipped: AtomicU64,
    dispatch_failures: AtomicU64,
}

impl Telemetry {
    pub fn record_full_cycle(&self) {
        self.full_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_minimal_cycle(&self) {
        self.minimal_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_cycle(&self) {
        self.failed_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feed_error(&self) {
        self.feed_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.records_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_blocked(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.records_blocked.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_settled(&self) {
        self.records_settled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            full_cycles: self.full_cycles.load(Ordering::Relaxed),
            minimal_cycles: self.minimal_cycles.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
            feed_errors: self.feed_errors.load(Ordering::Relaxed),
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_blocked: self.records_blocked.load(Ordering::Relaxed),
            records_settled: self.records_settled.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub full_cycles: u64,
    pub minimal_cycles: u64,
    pub failed_cycles: u64,
    pub feed_errors: u64,
    pub records_enqueued: u64,
    pub records_blocked: u64,
    pub records_settled: u64,
    pub records_skipped: u64,
    pub dispatch_failures: u64,
}

/// Logs the result of one cycle together with the running totals.
pub fn log_cycle(report: &CycleReport, snapshot: &TelemetrySnapshot) {
    let outcome = match &report.outcome {
        CycleOutcome::Advanced { .. } => "advanced",
        CycleOutcome::Unchanged { .. } => "unchanged",
        CycleOutcome::FeedUnavailable(_) => "feed_unavailable",
        CycleOutcome::Failed(_) => "failed",
    };

    tracing::info!(
        target: "peoplesync::metrics",
        kind = %report.kind,
        outcome,
        full_cycles = snapshot.full_cycles,
        minimal_cycles = snapshot.minimal_cycles,
        failed_cycles = snapshot.failed_cycles,
        feed_errors = snapshot.feed_errors,
        enqueued = snapshot.records_enqueued,
        blocked = snapshot.records_blocked,
        settled = snapshot.records_settled,
        skipped = snapshot.records_skipped,
        dispatch_failures = snapshot.dispatch_failures,
        "sync metrics snapshot"
    );
}
