use chrono::{DateTime, Utc};
use std::fmt;

/// One entry of the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Raw feed id; not guaranteed to be numeric.
    pub id: String,
    pub entity_id: String,
    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChangeEvent {
    pub fn new(
        id: impl Into<String>,
        entity_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            event_type: event_type.into(),
            timestamp: None,
        }
    }

    pub fn numeric_id(&self) -> Option<u64> {
        self.id.trim().parse().ok()
    }
}

const FEED_TERM_PREFIX: &str = "MyMobilityUser";

/// Dispatch class of a pending record, derived from its category term.
///
/// Only a closed vocabulary is recognised: the plain terms and their
/// `MyMobilityUser` prefixed forms, compared case-insensitively. Every other
/// term is [`Category::Other`] and never reaches the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Created,
    Deleted,
    EngagementChanged,
    Deactivate,
    Other,
}

impl Category {
    pub fn from_term(term: &str) -> Self {
        let term = term.trim();
        let unprefixed = term
            .get(..FEED_TERM_PREFIX.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(FEED_TERM_PREFIX))
            .map_or(term, |_| &term[FEED_TERM_PREFIX.len()..]);

        [
            Category::Created,
            Category::Deleted,
            Category::EngagementChanged,
            Category::Deactivate,
        ]
        .into_iter()
        .find(|category| unprefixed.eq_ignore_ascii_case(category.as_str()))
        .unwrap_or(Category::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Created => "Created",
            Category::Deleted => "Deleted",
            Category::EngagementChanged => "EngagementChanged",
            Category::Deactivate => "Deactivate",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
