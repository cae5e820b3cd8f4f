use crate::store::document::JsonDocument;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A change event accepted for downstream settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRecord {
    #[serde(rename = "id")]
    pub source_event_id: u64,
    #[serde(rename = "uId")]
    pub entity_id: String,
    #[serde(rename = "cat")]
    pub category: String,
}

impl PendingRecord {
    pub fn new(
        source_event_id: u64,
        entity_id: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            source_event_id,
            entity_id: entity_id.into(),
            category: category.into(),
        }
    }
}

/// Ordered queue of pending records persisted as a single JSON array.
///
/// Every mutation reloads the whole document, edits it in memory and writes it
/// back. There is no locking and no de-duplication.
#[derive(Debug, Clone)]
pub struct PendingQueueStore {
    document: JsonDocument<Vec<PendingRecord>>,
}

impl PendingQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path),
        }
    }

    pub async fn list(&self) -> Vec<PendingRecord> {
        self.document.load().await
    }

    pub async fn append_all(&self, records: &[PendingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut queue = self.document.load().await;
        queue.extend_from_slice(records);
        self.document.save(&queue).await?;
        tracing::debug!(
            appended = records.len(),
            queued = queue.len(),
            "pending queue extended"
        );
        Ok(())
    }

    /// Drops every record matching `predicate` and returns how many were removed.
    pub async fn remove_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&PendingRecord) -> bool,
    {
        let mut queue = self.document.load().await;
        let before = queue.len();
        queue.retain(|record| !predicate(record));
        let removed = before - queue.len();
        self.document.save(&queue).await?;
        tracing::debug!(removed, remaining = queue.len(), "pending queue pruned");
        Ok(removed)
    }
}
