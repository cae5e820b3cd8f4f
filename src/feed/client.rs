//! HTTP client for the upstream change feed and entity detail endpoints.

use crate::feed::atom::parse_feed;
use crate::http::auth::build_default_headers;
use crate::http::metrics::HttpMetrics;
use crate::http::{build_client, join_url, segment_url, send_for_text, truncate_for_log};
use crate::http::{HttpClientOptions, HttpMetricsSnapshot};
use crate::runtime::config::SyncConfig;
use crate::source::{ChangeEvent, ChangeFeedSource, EntityDetailSource, EntityDetails};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::Client;
use std::sync::Arc;

const FEED_ACCEPT: &str = "application/atom+xml, application/xml;q=0.9, application/json;q=0.8";

#[derive(Debug)]
pub enum FeedError {
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    MissingLatestId,
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Status {
                operation,
                status,
                body,
            } => write!(f, "feed {operation} returned HTTP {status}: {body}"),
            FeedError::MissingLatestId => {
                write!(f, "feed did not report a numeric latest event id")
            }
        }
    }
}

impl std::error::Error for FeedError {}

#[derive(Debug, Clone)]
pub struct FeedClient {
    base_url: Arc<String>,
    client: Client,
    options: HttpClientOptions,
    metrics: Arc<HttpMetrics>,
}

impl ChangeFeedSource for FeedClient {
    fn fetch_events<'a>(
        &'a self,
        after_id: u64,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ChangeEvent>>> {
        Box::pin(self.fetch_events(after_id, limit))
    }

    fn fetch_latest_id<'a>(&'a self) -> BoxFuture<'a, Result<u64>> {
        Box::pin(self.fetch_latest_id())
    }
}

impl EntityDetailSource for FeedClient {
    fn fetch_details<'a>(&'a self, entity_id: &'a str) -> BoxFuture<'a, Result<EntityDetails>> {
        Box::pin(self.fetch_details(entity_id))
    }
}

impl FeedClient {
    pub fn new(base_url: impl Into<String>, options: HttpClientOptions) -> Result<Self> {
        let headers = build_default_headers(&options.source_system, FEED_ACCEPT)?;
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
        Self::new(config.feed_base_url().to_owned(), config.feed_http_options())
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    pub fn metrics(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetches one page of events. An empty body is an empty page.
    pub async fn fetch_events(&self, after_id: u64, limit: usize) -> Result<Vec<ChangeEvent>> {
        let url = join_url(&self.base_url, &format!("events/after/{after_id}"));
        let body = self
            .get_text(self.client.get(url).query(&[("limit", limit)]), "events")
            .await?;

        if body.trim().is_empty() {
            tracing::info!(after_id, "feed returned an empty page body");
            return Ok(Vec::new());
        }

        let events = parse_feed(&body).with_context(|| {
            format!(
                "failed to parse feed page after {after_id}: {}",
                truncate_for_log(&body, self.options.max_logged_body_bytes)
            )
        })?;
        tracing::debug!(after_id, limit, events = events.len(), "feed page fetched");
        Ok(events)
    }

    /// Reads the id of the newest event via a single-entry query.
    pub async fn fetch_latest_id(&self) -> Result<u64> {
        let url = join_url(&self.base_url, "events");
        let body = self
            .get_text(self.client.get(url).query(&[("limit", 1)]), "latest")
            .await?;

        let events = parse_feed(&body).context("failed to parse latest-event document")?;
        let latest_id = events
            .first()
            .and_then(ChangeEvent::numeric_id)
            .ok_or(FeedError::MissingLatestId)?;
        tracing::debug!(latest_id, "latest feed event id fetched");
        Ok(latest_id)
    }

    pub async fn fetch_details(&self, entity_id: &str) -> Result<EntityDetails> {
        let url = segment_url(&self.base_url, "entities", entity_id)?;
        let body = self.get_text(self.client.get(url), "details").await?;

        serde_json::from_str(&body)
            .with_context(|| format!("failed to decode details for entity {entity_id}"))
    }

    async fn get_text(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<String> {
        let response = send_for_text(
            &self.metrics,
            request,
            operation,
            self.options.max_logged_body_bytes,
        )
        .await?;

        if !response.status.is_success() {
            return Err(FeedError::Status {
                operation,
                status: response.status.as_u16(),
                body: truncate_for_log(&response.body, self.options.max_logged_body_bytes)
                    .to_owned(),
            }
            .into());
        }

        Ok(response.body)
    }
}
