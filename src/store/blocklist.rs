use crate::store::document::JsonDocument;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// In-memory copy of the block list taken for one page or drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    entities: BTreeSet<String>,
}

impl BlockList {
    pub fn contains(&self, entity_id: &str) -> bool {
        self.entities.contains(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for BlockList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Entity ids excluded from record creation and settlement.
///
/// A malformed document is logged and treated as an empty list.
#[derive(Debug, Clone)]
pub struct BlockListFilter {
    document: JsonDocument<BTreeSet<String>>,
}

impl BlockListFilter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            document: JsonDocument::new(path),
        }
    }

    pub async fn is_blocked(&self, entity_id: &str) -> bool {
        self.document.load().await.contains(entity_id)
    }

    pub async fn snapshot(&self) -> BlockList {
        BlockList {
            entities: self.document.load().await,
        }
    }
}
