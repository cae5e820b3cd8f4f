use crate::engine::outcome::CycleReport;
use crate::engine::scheduler::CycleScheduler;
use crate::runtime::config::SyncConfig;
use crate::runtime::telemetry::log_cycle;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Triggers sync cycles on a fixed cadence and handles OS signals for graceful shutdowns.
///
/// Cycles run one at a time on a single task; a cycle in progress always
/// completes before shutdown is observed.
pub struct Runner {
    scheduler: Arc<CycleScheduler>,
    tick_interval: Duration,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Runner {
    pub fn new(config: &SyncConfig, scheduler: CycleScheduler) -> Self {
        Self::with_interval(config.tick_interval(), scheduler)
    }

    pub fn with_interval(tick_interval: Duration, scheduler: CycleScheduler) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            tick_interval,
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn scheduler(&self) -> Arc<CycleScheduler> {
        self.scheduler.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Runs a single cycle inline, for callers that own the trigger themselves.
    pub async fn run_once(&self) -> CycleReport {
        let report = self.scheduler.run_once().await;
        log_cycle(&report, &self.scheduler.telemetry().snapshot());
        report
    }

    /// Spawns the periodic trigger. The first cycle starts immediately.
    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let scheduler = self.scheduler.clone();
        let shutdown = self.shutdown.clone();
        let tick_interval = self.tick_interval;

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("sync loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = scheduler.run_once().await;
                        log_cycle(&report, &scheduler.telemetry().snapshot());
                    }
                }
            }
        }));

        tracing::info!(
            interval_secs = tick_interval.as_secs(),
            "sync loop started"
        );
        Ok(())
    }

    /// Cancels the trigger and waits for the loop (and any running cycle) to finish.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.shutdown.cancel();
        let joined = handle.await.context("sync loop terminated abnormally");
        self.reinitialize_shutdown_token();
        joined
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.start().await?;
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }

    fn reinitialize_shutdown_token(&mut self) {
        self.shutdown = CancellationToken::new();
    }
}
