use std::time::Duration;

use crate::support::{
    helpers::{config_for, init_tracing, scheduler_at_minute, wait_for_watermark},
    mock_services::{MockServer, MockServices},
};
use anyhow::Result;
use peoplesync::{CycleKind, CycleOutcome, Runner, WatermarkStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_ticks_until_stopped_and_can_restart() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.set_latest_id(Some(40));
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let watermark = WatermarkStore::new(config.watermark_path());

    let mut runner = Runner::with_interval(
        Duration::from_millis(50),
        scheduler_at_minute(&config, 3)?,
    );
    runner.start().await?;
    assert!(runner.is_running());
    wait_for_watermark(&watermark, 40, Duration::from_secs(5)).await?;
    runner.stop().await?;
    assert!(!runner.is_running());

    services.set_latest_id(Some(75));
    runner.start().await?;
    wait_for_watermark(&watermark, 75, Duration::from_secs(5)).await?;
    runner.stop().await?;

    let snapshot = runner.scheduler().telemetry().snapshot();
    assert!(
        snapshot.minimal_cycles >= 2,
        "expected at least two minimal cycles, got {}",
        snapshot.minimal_cycles
    );
    assert_eq!(snapshot.full_cycles, 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_the_token_ends_run_until_ctrl_c() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    let server = MockServer::start(services).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let mut runner = Runner::new(&config, scheduler_at_minute(&config, 3)?);

    let token = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), runner.run_until_ctrl_c()).await??;
    assert!(!runner.is_running());

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_once_reports_the_selected_cycle() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    for id in 0..=3 {
        services.push_event(id, &format!("u{id}"), "Created");
    }
    let server = MockServer::start(services).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let runner = Runner::new(&config, scheduler_at_minute(&config, 0)?);

    let report = runner.run_once().await;

    assert_eq!(report.kind, CycleKind::Full);
    assert!(!report.is_failure());
    assert!(matches!(
        report.outcome,
        CycleOutcome::Advanced { from: 0, to: 4 }
    ));
    assert!(!runner.is_running());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stop_without_start_is_a_no_op() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_for("http://127.0.0.1:9", dir.path(), 10)?;
    let mut runner = Runner::new(&config, scheduler_at_minute(&config, 3)?);

    runner.stop().await?;
    assert!(!runner.is_running());
    Ok(())
}
