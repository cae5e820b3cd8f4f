//! Drains the pending queue at the start of a full cycle.

use crate::directory::payload::build_payload;
use crate::engine::outcome::{DispatchAction, DispatchOutcome, DrainReport, SkipReason};
use crate::runtime::telemetry::Telemetry;
use crate::source::{Category, DirectoryService, EntityDetailSource};
use crate::store::{BlockListFilter, PendingQueueStore, PendingRecord};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;

pub struct QueueReconciler {
    details: Arc<dyn EntityDetailSource>,
    directory: Arc<dyn DirectoryService>,
    pending: PendingQueueStore,
    block_list: BlockListFilter,
    telemetry: Arc<Telemetry>,
}

impl QueueReconciler {
    pub fn new(
        details: Arc<dyn EntityDetailSource>,
        directory: Arc<dyn DirectoryService>,
        pending: PendingQueueStore,
        block_list: BlockListFilter,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            details,
            directory,
            pending,
            block_list,
            telemetry,
        }
    }

    /// Dispatches every queued record once, then removes all of them.
    ///
    /// Individual failures are logged and counted; they never stop the drain
    /// and never keep a record in the queue. Only the final queue rewrite can
    /// return an error.
    pub async fn drain(&self) -> Result<DrainReport> {
        let records = self.pending.list().await;
        let mut report = DrainReport::default();
        if records.is_empty() {
            tracing::debug!("pending queue is empty; nothing to reconcile");
            return Ok(report);
        }

        tracing::info!(records = records.len(), "reconciling pending queue");
        let blocked = self.block_list.snapshot().await;

        for record in &records {
            let outcome = if blocked.contains(&record.entity_id) {
                DispatchOutcome::Skipped(SkipReason::Blocked)
            } else {
                self.dispatch(record).await
            };
            self.observe(record, &outcome);
            report.record(&outcome);
        }

        let iterated: HashSet<u64> = records.iter().map(|r| r.source_event_id).collect();
        report.removed = self
            .pending
            .remove_where(|record| iterated.contains(&record.source_event_id))
            .await
            .context("failed to remove reconciled records")?;

        tracing::info!(
            attempted = report.attempted,
            settled = report.settled,
            tolerated = report.tolerated,
            skipped = report.skipped,
            failed = report.failed,
            removed = report.removed,
            "pending queue reconciled"
        );
        Ok(report)
    }

    /// Handles one record according to its category.
    pub async fn dispatch(&self, record: &PendingRecord) -> DispatchOutcome {
        match Category::from_term(&record.category) {
            Category::Other => {
                DispatchOutcome::Skipped(SkipReason::UnhandledCategory(record.category.clone()))
            }
            _ if record.entity_id.trim().is_empty() => {
                DispatchOutcome::Skipped(SkipReason::MissingEntityId)
            }
            Category::Created | Category::EngagementChanged => self.upsert(&record.entity_id).await,
            Category::Deleted | Category::Deactivate => self.deactivate(&record.entity_id).await,
        }
    }

    async fn upsert(&self, entity_id: &str) -> DispatchOutcome {
        let details = match self.details.fetch_details(entity_id).await {
            Ok(details) => details,
            Err(err) => {
                return DispatchOutcome::Failed(
                    err.context(format!("failed to fetch details for {entity_id}")),
                )
            }
        };

        let missing = details.missing_required_fields();
        if !missing.is_empty() {
            return DispatchOutcome::Skipped(SkipReason::MissingFields(missing));
        }

        let payload = build_payload(&details);
        match self.directory.create_or_update(&details.id, &payload).await {
            Ok(ack) => DispatchOutcome::Settled {
                action: DispatchAction::Upserted,
                ack,
            },
            Err(err) => DispatchOutcome::Failed(err),
        }
    }

    async fn deactivate(&self, entity_id: &str) -> DispatchOutcome {
        match self.directory.deactivate(entity_id).await {
            Ok(ack) => DispatchOutcome::Settled {
                action: DispatchAction::Deactivated,
                ack,
            },
            Err(err) => DispatchOutcome::Failed(err),
        }
    }

    fn observe(&self, record: &PendingRecord, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Settled { action, ack } => {
                self.telemetry.record_settled();
                tracing::info!(
                    event_id = record.source_event_id,
                    entity_id = %record.entity_id,
                    action = ?action,
                    ack = ?ack,
                    "pending record settled"
                );
            }
            DispatchOutcome::Skipped(reason) => {
                self.telemetry.record_skipped();
                tracing::info!(
                    event_id = record.source_event_id,
                    entity_id = %record.entity_id,
                    category = %record.category,
                    reason = %reason,
                    "pending record skipped"
                );
            }
            DispatchOutcome::Failed(err) => {
                self.telemetry.record_dispatch_failure();
                tracing::error!(
                    event_id = record.source_event_id,
                    entity_id = %record.entity_id,
                    category = %record.category,
                    error = %format!("{err:#}"),
                    "pending record dispatch failed; dropping without retry"
                );
            }
        }
    }
}
