use crate::support::{
    helpers::{config_for, init_tracing, person_json, scheduler_at_minute, SOURCE_SYSTEM},
    mock_services::{MockServer, MockServices},
};
use anyhow::Result;
use hyper::Method;
use peoplesync::{
    CycleKind, CycleOutcome, DirectoryClient, DirectoryError, FeedClient, FeedError,
    PendingQueueStore, SyncConfig, Watermark, WatermarkStore,
};
use serde_json::json;

const BASIC_AUTH: &str = "Basic c3luYzpzZWNyZXQ=";

struct Stores {
    watermark: WatermarkStore,
    pending: PendingQueueStore,
}

fn stores(config: &SyncConfig) -> Stores {
    Stores {
        watermark: WatermarkStore::new(config.watermark_path()),
        pending: PendingQueueStore::new(config.pending_queue_path()),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_cycles_discover_then_settle_changes_over_http() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.push_event(50, "u50", "MyMobilityUserCreated");
    services.push_event(51, "u51", "MyMobilityUserCreated");
    services.push_event(52, "u52", "MyMobilityUserDeleted");
    services.push_event(53, "u53", "MyMobilityUserEngagementChanged");
    services.push_event(54, "u54", "Deactivate");
    services.insert_entity("u50", person_json("u50", 7, &["101", "E-2"]));
    services.insert_entity("u51", person_json("u51", 8, &["102"]));
    services.insert_entity("u53", person_json("u53", 9, &["103"]));
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 2)?;
    let stores = stores(&config);
    stores.watermark.set(Watermark::new(50)).await?;

    let first = scheduler_at_minute(&config, 0)?.run_once().await;
    assert_eq!(first.kind, CycleKind::Full);
    assert!(
        matches!(first.outcome, CycleOutcome::Advanced { from: 50, to: 55 }),
        "unexpected outcome {:?}",
        first.outcome
    );
    assert_eq!(services.page_cursors(), vec![50, 52, 54]);
    assert_eq!(stores.pending.list().await.len(), 5);
    assert_eq!(stores.watermark.get().await.cursor, 55);
    assert!(services.directory_requests().is_empty());

    let second = scheduler_at_minute(&config, 10)?.run_once().await;
    assert_eq!(second.drain.as_ref().map(|drain| drain.settled), Some(5));
    assert!(stores.pending.list().await.is_empty());
    assert_eq!(stores.watermark.get().await.cursor, 55);

    let posts = services.directory_requests();
    let paths: Vec<&str> = posts.iter().map(|request| request.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/entities",
            "/entities",
            "/entities/deactivate",
            "/entities",
            "/entities/deactivate",
        ]
    );
    assert_eq!(
        posts[0].body,
        Some(json!({
            "id": "u50",
            "firstName": "Grace",
            "lastName": "Hopper 'Amazing'",
            "emailAddress": "u50@example.com",
            "role": "Advisor",
            "active": "true",
            "associatedClients": [7],
            "engagements": [101, "E-2"],
        }))
    );
    assert_eq!(posts[2].body, Some(json!({ "id": "u52" })));
    assert!(posts
        .iter()
        .all(|request| request.authorization.as_deref() == Some(BASIC_AUTH)));

    let requests = services.requests();
    assert!(requests
        .iter()
        .all(|request| request.source_system.as_deref() == Some(SOURCE_SYSTEM)));
    assert!(requests
        .iter()
        .filter(|request| request.method == Method::GET)
        .all(|request| request.authorization.is_none()));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn minimal_cycle_fast_forwards_without_paging() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.set_latest_id(Some(120));
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let stores = stores(&config);
    stores.watermark.set(Watermark::new(10)).await?;

    let report = scheduler_at_minute(&config, 7)?.run_once().await;

    assert_eq!(report.kind, CycleKind::Minimal);
    assert!(matches!(
        report.outcome,
        CycleOutcome::Advanced { from: 10, to: 120 }
    ));
    assert_eq!(stores.watermark.get().await.cursor, 120);
    assert!(services.page_cursors().is_empty());
    let latest_queries: Vec<_> = services
        .requests()
        .into_iter()
        .filter(|request| request.path == "/events")
        .collect();
    assert_eq!(latest_queries.len(), 1);
    assert_eq!(latest_queries[0].query.as_deref(), Some("limit=1"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tolerated_directory_rejection_settles_record() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.push_event(5, "u5", "Deleted");
    services.respond_to_directory(500, "Criteria was not met to deactivate");
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let stores = stores(&config);
    stores.watermark.set(Watermark::new(5)).await?;

    let scheduler = scheduler_at_minute(&config, 20)?;
    scheduler.run_once().await;
    let report = scheduler.run_once().await;

    let drain = report.drain.expect("drain report");
    assert_eq!(drain.settled, 1);
    assert_eq!(drain.tolerated, 1);
    assert_eq!(drain.failed, 0);
    assert_eq!(services.directory_requests().len(), 1);
    assert!(stores.pending.list().await.is_empty());

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn feed_outage_reports_unavailable_and_keeps_state() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.set_latest_id(None);
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let stores = stores(&config);
    stores.watermark.set(Watermark::new(33)).await?;

    let minimal = scheduler_at_minute(&config, 1)?.run_once().await;
    let full = scheduler_at_minute(&config, 30)?.run_once().await;

    assert!(matches!(minimal.outcome, CycleOutcome::FeedUnavailable(_)));
    assert!(matches!(full.outcome, CycleOutcome::FeedUnavailable(ref err) if format!("{err:#}").contains("503")));
    assert_eq!(stores.watermark.get().await.cursor, 33);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_page_stops_walk_at_last_consumed_event() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    for id in 0..=9 {
        services.push_event(id, &format!("u{id}"), "Created");
    }
    services.fail_page(4);
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 4)?;
    let stores = stores(&config);

    let scheduler = scheduler_at_minute(&config, 40)?;
    let report = scheduler.run_full().await;

    let walk = report.walk.as_ref().expect("walk report");
    assert!(walk.feed_error.is_some());
    assert_eq!(stores.watermark.get().await.cursor, 4);
    assert_eq!(stores.pending.list().await.len(), 4);
    assert_eq!(scheduler.telemetry().snapshot().feed_errors, 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_entity_is_skipped_and_watermark_moves_past_it() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.push_event(60, "u9", "Created");
    services.insert_entity("u9", person_json("u9", 1, &["1"]));
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    std::fs::write(config.block_list_path(), r#"["u9"]"#)?;
    let stores = stores(&config);
    stores.watermark.set(Watermark::new(60)).await?;

    let report = scheduler_at_minute(&config, 50)?.run_once().await;

    assert!(matches!(
        report.outcome,
        CycleOutcome::Advanced { from: 60, to: 61 }
    ));
    assert!(stores.pending.list().await.is_empty());
    assert_eq!(stores.watermark.get().await.cursor, 61);
    assert!(services
        .requests()
        .iter()
        .all(|request| !request.path.starts_with("/entities")));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_clients_surface_typed_errors() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.set_latest_id(None);
    services.respond_to_directory(400, "payload rejected");
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let feed = FeedClient::from_config(&config)?;
    let directory = DirectoryClient::from_config(&config)?;

    let err = feed
        .fetch_latest_id()
        .await
        .expect_err("offline feed should fail");
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::Status { status: 503, .. })
    ));

    let err = feed
        .fetch_details("nobody")
        .await
        .expect_err("unknown entity should fail");
    assert!(matches!(
        err.downcast_ref::<FeedError>(),
        Some(FeedError::Status { status: 404, .. })
    ));

    let err = directory
        .deactivate("u1")
        .await
        .expect_err("400 without a tolerated phrase should fail");
    match err.downcast_ref::<DirectoryError>() {
        Some(DirectoryError::Rejected { status, body, .. }) => {
            assert_eq!(*status, 400);
            assert_eq!(body, "payload rejected");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let events = feed.fetch_events(0, 10).await?;
    assert!(events.is_empty());
    assert_eq!(feed.metrics().requests, 3);
    assert_eq!(directory.metrics().requests, 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn entity_ids_are_sent_as_one_path_segment() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    services.insert_entity("team%2Fu7%3Fdebug=1", person_json("team/u7?debug=1", 7, &["1"]));
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = config_for(server.url(), dir.path(), 10)?;
    let feed = FeedClient::from_config(&config)?;

    let details = feed.fetch_details("team/u7?debug=1").await?;

    assert_eq!(details.id, "team/u7?debug=1");
    let request = services
        .requests()
        .into_iter()
        .find(|request| request.path.starts_with("/entities/"))
        .expect("details request recorded");
    assert_eq!(request.path, "/entities/team%2Fu7%3Fdebug=1");
    assert_eq!(request.query, None);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lone_directory_user_sends_no_authorization() -> Result<()> {
    init_tracing();
    let services = MockServices::default();
    let server = MockServer::start(services.clone()).await?;

    let dir = tempfile::tempdir()?;
    let config = SyncConfig::builder()
        .feed_base_url(server.url())
        .directory_base_url(server.url())
        .directory_credentials("sync", "")
        .source_system(SOURCE_SYSTEM)
        .state_dir(dir.path())
        .build()?;
    let directory = DirectoryClient::from_config(&config)?;

    directory.deactivate("u1").await?;

    let posts = services.directory_requests();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].authorization, None);
    assert_eq!(posts[0].source_system.as_deref(), Some(SOURCE_SYSTEM));

    server.shutdown().await;
    Ok(())
}
