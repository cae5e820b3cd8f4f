use crate::http::options::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOURCE_SYSTEM};
use crate::http::HttpClientOptions;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_FULL_CYCLE_MINUTE_MODULUS: u32 = 10;
const DEFAULT_TICK_INTERVAL_SECS: u64 = 120;
const WATERMARK_FILE: &str = "watermark.json";
const PENDING_QUEUE_FILE: &str = "pending_queue.json";
const BLOCK_LIST_FILE: &str = "block_list.json";

/// Runtime configuration for the sync engine and its HTTP collaborators.
///
/// All instances must be constructed via [`SyncConfig::builder`] or [`SyncConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    feed_base_url: String,
    directory_base_url: String,
    directory_user: String,
    directory_password: String,
    state_dir: PathBuf,
    watermark_path: PathBuf,
    pending_queue_path: PathBuf,
    block_list_path: PathBuf,
    page_size: usize,
    request_timeout: Duration,
    tick_interval: Duration,
    full_cycle_minute_modulus: u32,
    source_system: String,
    client_identity_pem: Option<PathBuf>,
    accept_invalid_certs: bool,
}

pub struct SyncConfigParams {
    pub feed_base_url: String,
    pub directory_base_url: String,
    pub directory_user: String,
    pub directory_password: String,
    pub state_dir: PathBuf,
    /// Overrides `state_dir/watermark.json`.
    pub watermark_path: Option<PathBuf>,
    /// Overrides `state_dir/pending_queue.json`.
    pub pending_queue_path: Option<PathBuf>,
    /// Overrides `state_dir/block_list.json`.
    pub block_list_path: Option<PathBuf>,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub tick_interval: Duration,
    pub full_cycle_minute_modulus: u32,
    pub source_system: String,
    pub client_identity_pem: Option<PathBuf>,
    pub accept_invalid_certs: bool,
}

impl SyncConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: SyncConfigParams) -> Result<Self> {
        let SyncConfigParams {
            feed_base_url,
            directory_base_url,
            directory_user,
            directory_password,
            state_dir,
            watermark_path,
            pending_queue_path,
            block_list_path,
            page_size,
            request_timeout,
            tick_interval,
            full_cycle_minute_modulus,
            source_system,
            client_identity_pem,
            accept_invalid_certs,
        } = params;

        let config = Self {
            feed_base_url: normalized_url(feed_base_url),
            directory_base_url: normalized_url(directory_base_url),
            directory_user: trimmed_string(directory_user),
            directory_password,
            watermark_path: watermark_path.unwrap_or_else(|| state_dir.join(WATERMARK_FILE)),
            pending_queue_path: pending_queue_path
                .unwrap_or_else(|| state_dir.join(PENDING_QUEUE_FILE)),
            block_list_path: block_list_path.unwrap_or_else(|| state_dir.join(BLOCK_LIST_FILE)),
            state_dir,
            page_size,
            request_timeout,
            tick_interval,
            full_cycle_minute_modulus,
            source_system: trimmed_string(source_system),
            client_identity_pem,
            accept_invalid_certs,
        };

        config.validate()?;
        Ok(config)
    }

    /// Base url of the change feed, without trailing slash.
    pub fn feed_base_url(&self) -> &str {
        &self.feed_base_url
    }

    /// Base url of the downstream directory, without trailing slash.
    pub fn directory_base_url(&self) -> &str {
        &self.directory_base_url
    }

    pub fn directory_user(&self) -> &str {
        &self.directory_user
    }

    pub fn directory_password(&self) -> &str {
        &self.directory_password
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn watermark_path(&self) -> &Path {
        &self.watermark_path
    }

    pub fn pending_queue_path(&self) -> &Path {
        &self.pending_queue_path
    }

    pub fn block_list_path(&self) -> &Path {
        &self.block_list_path
    }

    /// Number of events requested per feed page; also the page cursor stride.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Cadence of the in-process trigger used by [`crate::Runner`].
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// A cycle starting at minute `m` is full when `m % modulus == 0`.
    pub fn full_cycle_minute_modulus(&self) -> u32 {
        self.full_cycle_minute_modulus
    }

    pub fn source_system(&self) -> &str {
        &self.source_system
    }

    pub fn client_identity_pem(&self) -> Option<&Path> {
        self.client_identity_pem.as_deref()
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    /// HTTP options for the feed, including its TLS identity settings.
    pub fn feed_http_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            request_timeout: self.request_timeout,
            source_system: self.source_system.clone(),
            client_identity_pem: self.client_identity_pem.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
            ..HttpClientOptions::default()
        }
    }

    pub fn directory_http_options(&self) -> HttpClientOptions {
        HttpClientOptions {
            request_timeout: self.request_timeout,
            source_system: self.source_system.clone(),
            ..HttpClientOptions::default()
        }
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.feed_base_url, "feed_base_url")?;
        validate_url(&self.directory_base_url, "directory_base_url")?;
        ensure_not_empty(&self.source_system, "source_system")?;

        if self.state_dir.as_os_str().is_empty() {
            bail!("state_dir cannot be empty");
        }

        if self.page_size == 0 {
            bail!("page_size must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if self.tick_interval.is_zero() {
            bail!("tick_interval must be greater than 0");
        }

        if !(1..=60).contains(&self.full_cycle_minute_modulus) {
            bail!(
                "full_cycle_minute_modulus must be between 1 and 60 (got {})",
                self.full_cycle_minute_modulus
            );
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SyncConfigBuilder {
    feed_base_url: Option<String>,
    directory_base_url: Option<String>,
    directory_user: Option<String>,
    directory_password: Option<String>,
    state_dir: Option<PathBuf>,
    watermark_path: Option<PathBuf>,
    pending_queue_path: Option<PathBuf>,
    block_list_path: Option<PathBuf>,
    page_size: Option<usize>,
    request_timeout: Option<Duration>,
    tick_interval: Option<Duration>,
    full_cycle_minute_modulus: Option<u32>,
    source_system: Option<String>,
    client_identity_pem: Option<PathBuf>,
    accept_invalid_certs: Option<bool>,
}

impl SyncConfigBuilder {
    pub fn feed_base_url(mut self, url: impl Into<String>) -> Self {
        self.feed_base_url = Some(url.into());
        self
    }

    pub fn directory_base_url(mut self, url: impl Into<String>) -> Self {
        self.directory_base_url = Some(url.into());
        self
    }

    pub fn directory_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.directory_user = Some(user.into());
        self.directory_password = Some(password.into());
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn watermark_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.watermark_path = Some(path.into());
        self
    }

    pub fn pending_queue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pending_queue_path = Some(path.into());
        self
    }

    pub fn block_list_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.block_list_path = Some(path.into());
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn full_cycle_minute_modulus(mut self, modulus: u32) -> Self {
        self.full_cycle_minute_modulus = Some(modulus);
        self
    }

    pub fn source_system(mut self, value: impl Into<String>) -> Self {
        self.source_system = Some(value.into());
        self
    }

    pub fn client_identity_pem(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_identity_pem = Some(path.into());
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = Some(accept);
        self
    }

    pub fn build(self) -> Result<SyncConfig> {
        let params = SyncConfigParams {
            feed_base_url: self.feed_base_url.context("feed_base_url is required")?,
            directory_base_url: self
                .directory_base_url
                .context("directory_base_url is required")?,
            directory_user: self.directory_user.unwrap_or_default(),
            directory_password: self.directory_password.unwrap_or_default(),
            state_dir: self.state_dir.context("state_dir is required")?,
            watermark_path: self.watermark_path,
            pending_queue_path: self.pending_queue_path,
            block_list_path: self.block_list_path,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            tick_interval: self
                .tick_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS)),
            full_cycle_minute_modulus: self
                .full_cycle_minute_modulus
                .unwrap_or(DEFAULT_FULL_CYCLE_MINUTE_MODULUS),
            source_system: self
                .source_system
                .unwrap_or_else(|| DEFAULT_SOURCE_SYSTEM.to_owned()),
            client_identity_pem: self.client_identity_pem,
            accept_invalid_certs: self.accept_invalid_certs.unwrap_or(false),
        };

        SyncConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn normalized_url(value: String) -> String {
    value.trim().trim_end_matches('/').to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
