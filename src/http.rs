//! Shared HTTP plumbing for the feed and directory clients: client options,
//! authentication headers, TLS identity loading, request metrics and a couple
//! of logging helpers.

pub mod auth;
pub mod metrics;
pub mod options;

pub use metrics::HttpMetricsSnapshot;
pub use options::HttpClientOptions;

use crate::http::metrics::{HttpMetrics, RequestOutcome};
use anyhow::{anyhow, Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Identity, RequestBuilder, StatusCode, Url};
use tokio::time::Instant;

/// Status and body of a completed exchange, whatever the status code.
#[derive(Debug)]
pub(crate) struct TextResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Builds a `reqwest` client honouring the timeout and TLS switches in `options`.
pub(crate) fn build_client(options: &HttpClientOptions, headers: HeaderMap) -> Result<Client> {
    options.validate()?;

    let mut builder = Client::builder()
        .timeout(options.request_timeout)
        .default_headers(headers)
        .danger_accept_invalid_certs(options.accept_invalid_certs);

    if let Some(path) = &options.client_identity_pem {
        let pem = std::fs::read(path)
            .with_context(|| format!("failed to read client identity {}", path.display()))?;
        let identity = Identity::from_pem(&pem)
            .with_context(|| format!("invalid client identity in {}", path.display()))?;
        builder = builder.identity(identity);
    }

    builder.build().context("failed to build HTTP client")
}

/// Sends `request`, records metrics and reads the body as text.
///
/// Only transport failures and timeouts are errors here; status handling is
/// left to the caller.
pub(crate) async fn send_for_text(
    metrics: &HttpMetrics,
    request: RequestBuilder,
    operation: &'static str,
    log_limit: usize,
) -> Result<TextResponse> {
    let start = Instant::now();
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            let outcome = if err.is_timeout() {
                RequestOutcome::Timeout
            } else {
                RequestOutcome::Transport
            };
            metrics.record(outcome, start.elapsed());
            return Err(err).with_context(|| format!("{operation} request failed"));
        }
    };

    let status = response.status();
    let url = response.url().to_string();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            metrics.record(RequestOutcome::Transport, start.elapsed());
            return Err(err).with_context(|| format!("failed to read {operation} response body"));
        }
    };
    let elapsed = start.elapsed();
    metrics.record(
        RequestOutcome::Completed {
            status: status.as_u16(),
        },
        elapsed,
    );

    tracing::debug!(
        operation,
        url = %url,
        status = status.as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        body = truncate_for_log(&body, log_limit),
        "http response"
    );

    Ok(TextResponse { status, body })
}

/// Joins a base url and a path without doubling or dropping the separator.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Appends `segment` to `base/path` as a single percent-encoded path segment.
pub(crate) fn segment_url(base: &str, path: &str, segment: &str) -> Result<Url> {
    let joined = join_url(base, path);
    let mut url = Url::parse(&joined).with_context(|| format!("invalid url {joined}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("url {joined} cannot carry path segments"))?
        .push(segment);
    Ok(url)
}

/// Shortens a response body for log output.
pub(crate) fn truncate_for_log(body: &str, limit: usize) -> &str {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
