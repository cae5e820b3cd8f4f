//! Result values handed from the engine back to the cycle boundary.

use crate::source::DirectoryAck;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    Upserted,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Blocked,
    MissingEntityId,
    MissingFields(Vec<&'static str>),
    UnhandledCategory(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blocked => write!(f, "entity is on the block list"),
            SkipReason::MissingEntityId => write!(f, "record has no entity id"),
            SkipReason::MissingFields(fields) => {
                write!(f, "entity details missing {}", fields.join(", "))
            }
            SkipReason::UnhandledCategory(category) => {
                write!(f, "category {category:?} has no downstream action")
            }
        }
    }
}

/// What happened to one pending record during a drain.
#[derive(Debug)]
pub enum DispatchOutcome {
    Settled {
        action: DispatchAction,
        ack: DirectoryAck,
    },
    Skipped(SkipReason),
    Failed(anyhow::Error),
}

/// Tally of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub settled: usize,
    /// Settled records whose directory response was a tolerated rejection.
    pub tolerated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub removed: usize,
}

impl DrainReport {
    pub(crate) fn record(&mut self, outcome: &DispatchOutcome) {
        self.attempted += 1;
        match outcome {
            DispatchOutcome::Settled { ack, .. } => {
                self.settled += 1;
                if matches!(ack, DirectoryAck::Tolerated { .. }) {
                    self.tolerated += 1;
                }
            }
            DispatchOutcome::Skipped(_) => self.skipped += 1,
            DispatchOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Tally of one pagination walk over `[from_id, to_id]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub from_id: u64,
    pub to_id: u64,
    pub pages: usize,
    pub events_seen: usize,
    pub enqueued: usize,
    pub blocked: usize,
    /// Events with a non-numeric id or an id above `to_id`.
    pub ignored: usize,
    pub max_enqueued_id: Option<u64>,
    /// Highest in-range id that was enqueued or dropped by the block list.
    pub max_consumed_id: Option<u64>,
    /// Set when a page request failed and the walk stopped early.
    pub feed_error: Option<String>,
}

impl WalkReport {
    pub(crate) fn new(from_id: u64, to_id: u64) -> Self {
        Self {
            from_id,
            to_id,
            ..Self::default()
        }
    }

    /// Watermark to persist after the walk; never behind `from_id`.
    pub fn next_cursor(&self) -> u64 {
        self.max_consumed_id
            .map(|id| id.saturating_add(1))
            .unwrap_or(self.from_id)
            .max(self.from_id)
    }

    /// True when the walk consumed everything up to and including `to_id`.
    pub fn reached_target(&self) -> bool {
        self.max_consumed_id == Some(self.to_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Full,
    Minimal,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Full => f.write_str("full"),
            CycleKind::Minimal => f.write_str("minimal"),
        }
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// The watermark moved forward.
    Advanced { from: u64, to: u64 },
    /// Nothing new, or the walk consumed no event.
    Unchanged { cursor: u64, latest_id: u64 },
    /// The latest-id lookup failed; the watermark was not touched.
    FeedUnavailable(anyhow::Error),
    /// A store write failed; the watermark was not advanced.
    Failed(anyhow::Error),
}

#[derive(Debug)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub started_at: DateTime<Utc>,
    pub drain: Option<DrainReport>,
    pub walk: Option<WalkReport>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub(crate) fn new(kind: CycleKind, started_at: DateTime<Utc>, outcome: CycleOutcome) -> Self {
        Self {
            kind,
            started_at,
            drain: None,
            walk: None,
            outcome,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            CycleOutcome::FeedUnavailable(_) | CycleOutcome::Failed(_)
        )
    }
}
