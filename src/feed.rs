//! Upstream change feed: Atom document parsing and the HTTP client that
//! serves both the event pages and the entity detail lookups.

pub mod atom;
pub mod client;

pub use atom::{entity_id_from_uri, parse_feed};
pub use client::{FeedClient, FeedError};
