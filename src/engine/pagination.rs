//! Walks the change feed page by page and turns in-range events into pending
//! records.

use crate::engine::outcome::WalkReport;
use crate::runtime::telemetry::Telemetry;
use crate::source::ChangeFeedSource;
use crate::store::{BlockListFilter, PendingQueueStore, PendingRecord};
use anyhow::Result;
use std::sync::Arc;

pub struct PaginationDriver {
    feed: Arc<dyn ChangeFeedSource>,
    pending: PendingQueueStore,
    block_list: BlockListFilter,
    page_size: usize,
    telemetry: Arc<Telemetry>,
}

impl PaginationDriver {
    pub fn new(
        feed: Arc<dyn ChangeFeedSource>,
        pending: PendingQueueStore,
        block_list: BlockListFilter,
        page_size: usize,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            feed,
            pending,
            block_list,
            page_size: page_size.max(1),
            telemetry,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Walks `[from_id, to_id]` and enqueues every accepted event.
    ///
    /// The page cursor advances by `page_size` per request no matter how many
    /// events came back. The walk ends on an empty page, a failed page request,
    /// or once the cursor passes `to_id`. Each page is appended to the queue
    /// before the next one is requested; only queue write errors are returned.
    pub async fn walk(&self, from_id: u64, to_id: u64) -> Result<WalkReport> {
        let mut report = WalkReport::new(from_id, to_id);
        let mut cursor = from_id;

        while cursor <= to_id {
            let events = match self.feed.fetch_events(cursor, self.page_size).await {
                Ok(events) => events,
                Err(err) => {
                    self.telemetry.record_feed_error();
                    tracing::warn!(
                        cursor,
                        error = %format!("{err:#}"),
                        "feed page request failed; treating feed as exhausted"
                    );
                    report.feed_error = Some(format!("{err:#}"));
                    break;
                }
            };

            if events.is_empty() {
                tracing::info!(cursor, "feed returned no events; pagination finished");
                break;
            }

            report.pages += 1;
            report.events_seen += events.len();
            let blocked = self.block_list.snapshot().await;
            let mut records = Vec::with_capacity(events.len());
            let mut page_blocked = 0usize;

            for event in &events {
                let Some(id) = event.numeric_id().filter(|id| *id <= to_id) else {
                    report.ignored += 1;
                    continue;
                };
                report.max_consumed_id = report.max_consumed_id.max(Some(id));

                if blocked.contains(&event.entity_id) {
                    tracing::debug!(
                        event_id = id,
                        entity_id = %event.entity_id,
                        "event skipped; entity is blocked"
                    );
                    page_blocked += 1;
                    continue;
                }

                report.max_enqueued_id = report.max_enqueued_id.max(Some(id));
                records.push(PendingRecord::new(
                    id,
                    event.entity_id.clone(),
                    event.event_type.clone(),
                ));
            }

            self.pending.append_all(&records).await?;
            report.enqueued += records.len();
            report.blocked += page_blocked;
            self.telemetry.record_enqueued(records.len() as u64);
            self.telemetry.record_blocked(page_blocked as u64);

            tracing::info!(
                cursor,
                events = events.len(),
                enqueued = records.len(),
                blocked = page_blocked,
                "feed page processed"
            );

            match cursor.checked_add(self.page_size as u64) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        tracing::info!(
            from_id,
            to_id,
            pages = report.pages,
            enqueued = report.enqueued,
            max_enqueued_id = ?report.max_enqueued_id,
            "pagination complete"
        );
        Ok(report)
    }
}
