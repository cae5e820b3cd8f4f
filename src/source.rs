//! Collaborator seams consumed by the sync engine together with the data they
//! exchange. Production implementations live in [`crate::feed`] and
//! [`crate::directory`]; tests substitute in-memory fakes.

pub mod entity;
pub mod event;

pub use entity::{AssociatedClient, EntityDetails};
pub use event::{Category, ChangeEvent};

use crate::directory::payload::EntityPayload;
use anyhow::Result;
use futures::future::BoxFuture;

/// Upstream change feed, paged by event id.
pub trait ChangeFeedSource: Send + Sync {
    /// Returns the page of events starting at `after_id`, at most `limit` long.
    fn fetch_events<'a>(
        &'a self,
        after_id: u64,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ChangeEvent>>>;

    /// Returns the id of the most recent event in the feed.
    fn fetch_latest_id<'a>(&'a self) -> BoxFuture<'a, Result<u64>>;
}

pub trait EntityDetailSource: Send + Sync {
    fn fetch_details<'a>(&'a self, entity_id: &'a str) -> BoxFuture<'a, Result<EntityDetails>>;
}

/// How the directory answered a request that counts as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryAck {
    Accepted,
    /// Non-2xx response carrying one of the known harmless rejection phrases.
    Tolerated { status: u16 },
}

/// Downstream people directory.
pub trait DirectoryService: Send + Sync {
    fn create_or_update<'a>(
        &'a self,
        entity_id: &'a str,
        payload: &'a EntityPayload,
    ) -> BoxFuture<'a, Result<DirectoryAck>>;

    fn deactivate<'a>(&'a self, entity_id: &'a str) -> BoxFuture<'a, Result<DirectoryAck>>;
}
