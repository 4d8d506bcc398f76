//! Install and activate scenarios against the in-memory platform.

use std::sync::Arc;

use http::StatusCode;
use olxmon_sw::{
    AgentConfig, AgentEvent, EventOutcome, InMemoryPlatform, PlatformCall, Response,
    ServiceWorkerAgent, ServiceWorkerError,
};

const SHELL: [&str; 4] = [
    "http://localhost:8080/",
    "http://localhost:8080/static/icon-192.png",
    "http://localhost:8080/static/icon-512.png",
    "http://localhost:8080/static/manifest.json",
];

async fn setup() -> (Arc<InMemoryPlatform>, ServiceWorkerAgent) {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.route_all_ok(SHELL).await;
    let agent = ServiceWorkerAgent::new(AgentConfig::default(), platform.clone()).unwrap();
    (platform, agent)
}

#[tokio::test]
async fn test_install_caches_every_shell_resource() {
    let (platform, agent) = setup().await;

    let outcome = agent.handle(AgentEvent::Install).await.unwrap();
    let EventOutcome::Installed(report) = outcome else {
        panic!("expected an install report");
    };

    assert_eq!(report.cache_name, "olx-monitor-v1");
    assert_eq!(report.cached, SHELL.to_vec());

    let mut expected: Vec<&str> = SHELL.to_vec();
    expected.sort();
    assert_eq!(platform.cached_urls("olx-monitor-v1").await, expected);
    assert!(platform.skipped_waiting());
}

#[tokio::test]
async fn test_install_is_all_or_nothing_on_network_failure() {
    let (platform, agent) = setup().await;
    platform.fail_url(SHELL[2]).await;

    let err = agent.handle(AgentEvent::Install).await.unwrap_err();
    match err {
        ServiceWorkerError::Install { url, .. } => assert_eq!(url, SHELL[2]),
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(platform.cache_names().await.is_empty());
    assert!(!platform.skipped_waiting());
    assert!(!platform
        .journal()
        .await
        .iter()
        .any(|c| matches!(c, PlatformCall::CachePut { .. })));
}

#[tokio::test]
async fn test_install_fails_when_storage_fails() {
    let (platform, agent) = setup().await;
    platform.set_fail_put(true);

    let err = agent.handle(AgentEvent::Install).await.unwrap_err();
    match err {
        ServiceWorkerError::Install { url, reason } => {
            assert_eq!(url, "olx-monitor-v1");
            assert!(reason.contains("quota exceeded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(platform.cache_names().await.is_empty());
    assert!(!platform.skipped_waiting());
    assert!(!platform.journal().await.contains(&PlatformCall::SkipWaiting));
}

#[tokio::test]
async fn test_install_fails_on_bad_status() {
    let (platform, agent) = setup().await;
    platform
        .route(SHELL[3], Response::new(StatusCode::NOT_FOUND, "missing"))
        .await;

    let err = agent.handle(AgentEvent::Install).await.unwrap_err();
    assert_eq!(err.category(), "install");
    assert!(err.to_string().contains("404"));
    assert!(platform.cache_names().await.is_empty());
}

#[tokio::test]
async fn test_skip_waiting_follows_cache_population() {
    let (platform, agent) = setup().await;
    agent.handle(AgentEvent::Install).await.unwrap();

    let journal = platform.journal().await;
    let put = journal
        .iter()
        .position(|c| matches!(c, PlatformCall::CachePut { .. }))
        .unwrap();
    let skip = journal
        .iter()
        .position(|c| c == &PlatformCall::SkipWaiting)
        .unwrap();
    assert!(put < skip);
    assert_eq!(
        journal[put],
        PlatformCall::CachePut {
            cache: "olx-monitor-v1".to_string(),
            entries: 4
        }
    );
}

#[tokio::test]
async fn test_activate_removes_stale_caches() {
    let (platform, agent) = setup().await;
    platform.seed_cache("olx-monitor-v0").await;
    platform.seed_cache("some-other-cache").await;
    agent.handle(AgentEvent::Install).await.unwrap();

    let outcome = agent.handle(AgentEvent::Activate).await.unwrap();
    let EventOutcome::Activated(mut report) = outcome else {
        panic!("expected an activate report");
    };
    report.deleted.sort();

    assert_eq!(report.kept.as_deref(), Some("olx-monitor-v1"));
    assert_eq!(report.deleted, vec!["olx-monitor-v0", "some-other-cache"]);
    assert!(report.failed.is_empty());
    assert_eq!(platform.cache_names().await, vec!["olx-monitor-v1"]);
    assert!(platform.claimed());
}

#[tokio::test]
async fn test_activate_is_idempotent() {
    let (platform, agent) = setup().await;
    platform.seed_cache("olx-monitor-v0").await;
    agent.handle(AgentEvent::Install).await.unwrap();
    agent.handle(AgentEvent::Activate).await.unwrap();

    let outcome = agent.handle(AgentEvent::Activate).await.unwrap();
    let EventOutcome::Activated(report) = outcome else {
        panic!("expected an activate report");
    };
    assert!(report.deleted.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(platform.cache_names().await, vec!["olx-monitor-v1"]);
}

#[tokio::test]
async fn test_activate_tolerates_failed_deletion() {
    let (platform, agent) = setup().await;
    platform.seed_cache("stuck").await;
    platform.seed_cache("olx-monitor-v0").await;
    platform.fail_delete("stuck").await;

    let outcome = agent.handle(AgentEvent::Activate).await.unwrap();
    let EventOutcome::Activated(report) = outcome else {
        panic!("expected an activate report");
    };

    assert_eq!(report.failed, vec!["stuck"]);
    assert_eq!(report.deleted, vec!["olx-monitor-v0"]);
    assert_eq!(report.kept, None);
    assert_eq!(platform.cache_names().await, vec!["stuck"]);
    assert!(platform.claimed());
}

#[tokio::test]
async fn test_version_bump_replaces_previous_cache() {
    let platform = Arc::new(InMemoryPlatform::new());
    platform.route_all_ok(SHELL).await;

    let v1 = ServiceWorkerAgent::new(AgentConfig::default(), platform.clone()).unwrap();
    v1.handle(AgentEvent::Install).await.unwrap();
    v1.handle(AgentEvent::Activate).await.unwrap();

    let config = AgentConfig {
        cache_version: "olx-monitor-v2".to_string(),
        ..AgentConfig::default()
    };
    let v2 = ServiceWorkerAgent::new(config, platform.clone()).unwrap();
    v2.handle(AgentEvent::Install).await.unwrap();
    assert_eq!(
        platform.cache_names().await,
        vec!["olx-monitor-v1", "olx-monitor-v2"]
    );

    v2.handle(AgentEvent::Activate).await.unwrap();
    assert_eq!(platform.cache_names().await, vec!["olx-monitor-v2"]);
}
