use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use peoplesync::{
    Collaborators, CycleScheduler, DirectoryClient, FeedClient, Runner, SyncConfig,
};

const DEFAULT_STATE_DIR: &str = "./state";
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TICK_SECS: u64 = 120;
const DEFAULT_FULL_CYCLE_MODULUS: u32 = 10;
const DEFAULT_SOURCE_SYSTEM: &str = "peoplesync";

#[tokio::main]
async fn main() -> Result<()> {
    peoplesync::init_tracing();

    let once = match env::args().nth(1).as_deref() {
        None => false,
        Some("--once") => true,
        Some(other) => bail!("unknown argument {other:?}; usage: peoplesync [--once]"),
    };

    let config = config_from_env()?;
    tracing::info!(
        feed = config.feed_base_url(),
        directory = config.directory_base_url(),
        state_dir = %config.state_dir().display(),
        page_size = config.page_size(),
        "peoplesync configured"
    );

    let feed = Arc::new(FeedClient::from_config(&config)?);
    let directory = Arc::new(DirectoryClient::from_config(&config)?);
    let scheduler = CycleScheduler::new(
        &config,
        Collaborators {
            feed: feed.clone(),
            details: feed,
            directory,
        },
    );
    let mut runner = Runner::new(&config, scheduler);

    if once {
        let report = runner.run_once().await;
        if report.is_failure() {
            bail!("sync cycle did not complete: {:?}", report.outcome);
        }
        return Ok(());
    }

    runner.run_until_ctrl_c().await
}

fn config_from_env() -> Result<SyncConfig> {
    let mut builder = SyncConfig::builder()
        .feed_base_url(require_env("PEOPLESYNC_FEED_URL")?)
        .directory_base_url(require_env("PEOPLESYNC_DIRECTORY_URL")?)
        .directory_credentials(
            read_env_or_default("PEOPLESYNC_DIRECTORY_USER", ""),
            read_env_or_default("PEOPLESYNC_DIRECTORY_PASSWORD", ""),
        )
        .state_dir(read_env_or_default("PEOPLESYNC_STATE_DIR", DEFAULT_STATE_DIR))
        .page_size(parse_env_with_default("PEOPLESYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?)
        .request_timeout(Duration::from_secs(parse_env_with_default(
            "PEOPLESYNC_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?))
        .tick_interval(Duration::from_secs(parse_env_with_default(
            "PEOPLESYNC_TICK_SECS",
            DEFAULT_TICK_SECS,
        )?))
        .full_cycle_minute_modulus(parse_env_with_default(
            "PEOPLESYNC_FULL_CYCLE_MODULUS",
            DEFAULT_FULL_CYCLE_MODULUS,
        )?)
        .source_system(read_env_or_default(
            "PEOPLESYNC_SOURCE_SYSTEM",
            DEFAULT_SOURCE_SYSTEM,
        ))
        .accept_invalid_certs(parse_env_with_default(
            "PEOPLESYNC_ACCEPT_INVALID_CERTS",
            false,
        )?);

    if let Ok(path) = env::var("PEOPLESYNC_CLIENT_IDENTITY_PEM") {
        if !path.trim().is_empty() {
            builder = builder.client_identity_pem(PathBuf::from(path.trim()));
        }
    }

    builder.build()
}

fn require_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => bail!("{key} cannot be empty"),
        Err(err) => Err(err).with_context(|| format!("{key} must be set")),
    }
}

fn read_env_or_default(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn parse_env_with_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("failed to parse {key}='{value}'")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
    }
}
