//! Per-invocation cycle selection and orchestration.
//!
//! A cycle starting on a minute divisible by the configured modulus is a full
//! cycle (drain, discover, advance); every other cycle is minimal and only
//! fast-forwards the watermark to the newest event id. The ratio between the
//! two depends on the cadence of whatever triggers the cycles.

use crate::engine::outcome::{CycleKind, CycleOutcome, CycleReport};
use crate::engine::pagination::PaginationDriver;
use crate::engine::reconciler::QueueReconciler;
use crate::runtime::config::SyncConfig;
use crate::runtime::telemetry::Telemetry;
use crate::source::{ChangeFeedSource, DirectoryService, EntityDetailSource};
use crate::store::{BlockListFilter, PendingQueueStore, Watermark, WatermarkStore};
use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;

/// Wall-clock source used for the full/minimal decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// External services a scheduler talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub feed: Arc<dyn ChangeFeedSource>,
    pub details: Arc<dyn EntityDetailSource>,
    pub directory: Arc<dyn DirectoryService>,
}

pub struct CycleScheduler {
    watermark: WatermarkStore,
    feed: Arc<dyn ChangeFeedSource>,
    driver: PaginationDriver,
    reconciler: QueueReconciler,
    clock: Arc<dyn Clock>,
    minute_modulus: u32,
    telemetry: Arc<Telemetry>,
}

impl CycleScheduler {
    pub fn new(config: &SyncConfig, collaborators: Collaborators) -> Self {
        let telemetry = Arc::new(Telemetry::default());
        let pending = PendingQueueStore::new(config.pending_queue_path());
        let block_list = BlockListFilter::new(config.block_list_path());

        let driver = PaginationDriver::new(
            collaborators.feed.clone(),
            pending.clone(),
            block_list.clone(),
            config.page_size(),
            telemetry.clone(),
        );
        let reconciler = QueueReconciler::new(
            collaborators.details,
            collaborators.directory,
            pending,
            block_list,
            telemetry.clone(),
        );

        Self {
            watermark: WatermarkStore::new(config.watermark_path()),
            feed: collaborators.feed,
            driver,
            reconciler,
            clock: Arc::new(SystemClock),
            minute_modulus: config.full_cycle_minute_modulus().max(1),
            telemetry,
        }
    }

    /// Replaces the wall clock used to pick the cycle kind.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    pub fn select_kind(&self, now: DateTime<Utc>) -> CycleKind {
        if now.minute() % self.minute_modulus == 0 {
            CycleKind::Full
        } else {
            CycleKind::Minimal
        }
    }

    /// Runs the cycle kind selected by the current minute. Never fails; problems
    /// are reported through [`CycleReport::outcome`].
    pub async fn run_once(&self) -> CycleReport {
        let now = self.clock.now();
        let kind = self.select_kind(now);
        tracing::info!(
            minute = now.minute(),
            now = %now.to_rfc3339(),
            kind = %kind,
            "sync cycle starting"
        );

        match kind {
            CycleKind::Full => self.run_full_at(now).await,
            CycleKind::Minimal => self.run_minimal_at(now).await,
        }
    }

    /// Forces a minimal cycle regardless of the clock.
    pub async fn run_minimal(&self) -> CycleReport {
        self.run_minimal_at(self.clock.now()).await
    }

    /// Forces a full cycle regardless of the clock.
    pub async fn run_full(&self) -> CycleReport {
        self.run_full_at(self.clock.now()).await
    }

    async fn run_minimal_at(&self, started_at: DateTime<Utc>) -> CycleReport {
        self.telemetry.record_minimal_cycle();
        let outcome = match self.fast_forward().await {
            Ok(outcome) => outcome,
            Err(err) => self.failed(err),
        };
        CycleReport::new(CycleKind::Minimal, started_at, outcome)
    }

    async fn fast_forward(&self) -> Result<CycleOutcome> {
        let cursor = self.watermark.get().await.cursor;
        let latest_id = match self.latest_id().await {
            Ok(latest_id) => latest_id,
            Err(outcome) => return Ok(outcome),
        };

        if latest_id < cursor {
            tracing::info!(cursor, latest_id, "latest id behind watermark; nothing to do");
            return Ok(CycleOutcome::Unchanged { cursor, latest_id });
        }

        self.watermark.set(Watermark::new(latest_id)).await?;
        tracing::info!(from = cursor, to = latest_id, "watermark fast-forwarded");
        Ok(if latest_id == cursor {
            CycleOutcome::Unchanged { cursor, latest_id }
        } else {
            CycleOutcome::Advanced {
                from: cursor,
                to: latest_id,
            }
        })
    }

    async fn run_full_at(&self, started_at: DateTime<Utc>) -> CycleReport {
        self.telemetry.record_full_cycle();
        let mut report = CycleReport::new(
            CycleKind::Full,
            started_at,
            CycleOutcome::Unchanged {
                cursor: 0,
                latest_id: 0,
            },
        );

        report.outcome = match self.reconcile_and_discover(&mut report).await {
            Ok(outcome) => outcome,
            Err(err) => self.failed(err),
        };
        report
    }

    async fn reconcile_and_discover(&self, report: &mut CycleReport) -> Result<CycleOutcome> {
        report.drain = Some(self.reconciler.drain().await?);

        let cursor = self.watermark.get().await.cursor;
        let latest_id = match self.latest_id().await {
            Ok(latest_id) => latest_id,
            Err(outcome) => return Ok(outcome),
        };

        if latest_id < cursor {
            tracing::info!(cursor, latest_id, "latest id behind watermark; skipping discovery");
            return Ok(CycleOutcome::Unchanged { cursor, latest_id });
        }

        let walk = self.driver.walk(cursor, latest_id).await?;
        let next = walk.next_cursor();
        let reached_target = walk.reached_target();
        report.walk = Some(walk);

        self.watermark.set(Watermark::new(next)).await?;
        if reached_target {
            tracing::info!(next, latest_id, "all events up to the latest id processed");
        } else {
            tracing::info!(
                next,
                latest_id,
                "events remain below the latest id; next full cycle resumes from the watermark"
            );
        }

        Ok(if next == cursor {
            CycleOutcome::Unchanged { cursor, latest_id }
        } else {
            CycleOutcome::Advanced {
                from: cursor,
                to: next,
            }
        })
    }

    async fn latest_id(&self) -> Result<u64, CycleOutcome> {
        match self.feed.fetch_latest_id().await {
            Ok(latest_id) => Ok(latest_id),
            Err(err) => {
                self.telemetry.record_feed_error();
                tracing::error!(
                    error = %format!("{err:#}"),
                    "failed to fetch latest event id; watermark left untouched"
                );
                Err(CycleOutcome::FeedUnavailable(err))
            }
        }
    }

    fn failed(&self, err: anyhow::Error) -> CycleOutcome {
        self.telemetry.record_failed_cycle();
        tracing::error!(error = %format!("{err:#}"), "sync cycle aborted");
        CycleOutcome::Failed(err)
    }
}
