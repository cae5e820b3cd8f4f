//! HTTP client for the downstream directory.

use crate::directory::payload::EntityPayload;
use crate::http::auth::{apply_basic_auth, build_default_headers};
use crate::http::metrics::HttpMetrics;
use crate::http::{build_client, join_url, send_for_text, truncate_for_log};
use crate::http::{HttpClientOptions, HttpMetricsSnapshot};
use crate::runtime::config::SyncConfig;
use crate::source::{DirectoryAck, DirectoryService};
use anyhow::Result;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

/// Response phrases the directory uses for rejections that are not failures.
pub const TOLERATED_REJECTIONS: [&str; 2] = [
    "Criteria was not met to deactivate",
    "No engagements where provided",
];

#[derive(Debug)]
pub enum DirectoryError {
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Rejected {
                operation,
                status,
                body,
            } => write!(f, "directory {operation} rejected with HTTP {status}: {body}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Maps a directory response onto success, tolerated rejection, or failure.
pub fn classify_response(
    operation: &'static str,
    status: u16,
    body: &str,
) -> Result<DirectoryAck, DirectoryError> {
    if (200..300).contains(&status) {
        return Ok(DirectoryAck::Accepted);
    }
    if TOLERATED_REJECTIONS
        .iter()
        .any(|phrase| body.contains(phrase))
    {
        return Ok(DirectoryAck::Tolerated { status });
    }
    Err(DirectoryError::Rejected {
        operation,
        status,
        body: body.to_owned(),
    })
}

#[derive(Serialize)]
struct DeactivateRequest<'a> {
    id: &'a str,
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    base_url: Arc<String>,
    client: Client,
    options: HttpClientOptions,
    metrics: Arc<HttpMetrics>,
}

impl DirectoryService for DirectoryClient {
    fn create_or_update<'a>(
        &'a self,
        entity_id: &'a str,
        payload: &'a EntityPayload,
    ) -> BoxFuture<'a, Result<DirectoryAck>> {
        Box::pin(self.create_or_update(entity_id, payload))
    }

    fn deactivate<'a>(&'a self, entity_id: &'a str) -> BoxFuture<'a, Result<DirectoryAck>> {
        Box::pin(self.deactivate(entity_id))
    }
}

impl DirectoryClient {
    pub fn new(
        base_url: impl Into<String>,
        user: &str,
        password: &str,
        options: HttpClientOptions,
    ) -> Result<Self> {
        let mut headers = build_default_headers(&options.source_system, "application/json")?;
        apply_basic_auth(&mut headers, user, password)?;
        let client = build_client(&options, headers)?;

        Ok(Self {
            base_url: Arc::new(base_url.into()),
            client,
            options,
            metrics: Arc::new(HttpMetrics::default()),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.directory_base_url().to_owned(),
            config.directory_user(),
            config.directory_password(),
            config.directory_http_options(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn create_or_update(
        &self,
        entity_id: &str,
        payload: &EntityPayload,
    ) -> Result<DirectoryAck> {
        self.post("create_or_update", "entities", entity_id, payload)
            .await
    }

    pub async fn deactivate(&self, entity_id: &str) -> Result<DirectoryAck> {
        self.post(
            "deactivate",
            "entities/deactivate",
            entity_id,
            &DeactivateRequest { id: entity_id },
        )
        .await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        path: &str,
        entity_id: &str,
        body: &B,
    ) -> Result<DirectoryAck> {
        let url = join_url(&self.base_url, path);
        let response = send_for_text(
            &self.metrics,
            self.client.post(url).json(body),
            operation,
            self.options.max_logged_body_bytes,
        )
        .await?;

        let status = response.status.as_u16();
        let ack = classify_response(operation, status, &response.body)?;
        let body = truncate_for_log(&response.body, self.options.max_logged_body_bytes);
        match ack {
            DirectoryAck::Accepted => {
                tracing::info!(entity_id, operation, status, "directory accepted request");
                Ok(DirectoryAck::Accepted)
            }
            ack @ DirectoryAck::Tolerated { .. } => {
                tracing::info!(
                    entity_id,
                    operation,
                    status,
                    body,
                    "directory rejection matched a tolerated condition"
                );
                Ok(ack)
            }
        }
    }
}
