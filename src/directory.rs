//! Downstream people directory: payload construction and the HTTP client
//! that submits create-or-update and deactivate requests.

pub mod client;
pub mod payload;

pub use client::{classify_response, DirectoryClient, DirectoryError, TOLERATED_REJECTIONS};
pub use payload::{build_payload, sanitize, EngagementRef, EntityPayload};
