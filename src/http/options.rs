//! Knobs shared by the outbound HTTP clients.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SOURCE_SYSTEM: &str = "peoplesync";
const DEFAULT_MAX_LOGGED_BODY_BYTES: usize = 2_048;

#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub request_timeout: Duration,
    /// Value of the `X-Source-System` header sent with every request.
    pub source_system: String,
    /// PEM bundle (certificate and private key) presented during the TLS handshake.
    pub client_identity_pem: Option<PathBuf>,
    pub accept_invalid_certs: bool,
    pub max_logged_body_bytes: usize,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            source_system: DEFAULT_SOURCE_SYSTEM.to_owned(),
            client_identity_pem: None,
            accept_invalid_certs: false,
            max_logged_body_bytes: DEFAULT_MAX_LOGGED_BODY_BYTES,
        }
    }
}

impl HttpClientOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.source_system.trim().is_empty() {
            bail!("source_system cannot be empty");
        }
        Ok(())
    }
}
