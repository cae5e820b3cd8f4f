use crate::store::document::JsonDocument;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Next event id the engine expects from the change feed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    #[serde(rename = "startId")]
    pub cursor: u64,
}

impl Watermark {
    pub fn new(cursor: u64) -> Self {
        Self { cursor }
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkStore {
    document: JsonDocument<Watermark>,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path),
        }
    }

    pub async fn get(&self) -> Watermark {
        self.document.load().await
    }

    pub async fn set(&self, watermark: Watermark) -> Result<()> {
        self.document.save(&watermark).await?;
        tracing::debug!(cursor = watermark.cursor, "watermark persisted");
        Ok(())
    }
}
