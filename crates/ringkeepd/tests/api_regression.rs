//! Status API regression tests.
//!
//! Drives the router with `oneshot` against an in-memory coordinator; the
//! daemon loop is not running unless a test runs a pass itself.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ringkeep_coord::{Coordinator, LocalCoordinator};
use ringkeep_core::{DaemonConfig, DaemonState, HostAddress, Topology};
use ringkeep_storage::EngineRegistry;
use ringkeep_update::UpdateDaemon;
use ringkeepd::api::build_router;
use serde_json::Value;
use tower::ServiceExt;

const TOPOLOGY: &str = r#"
[[ring_group]]
name = "rg1"

[ring_group.domain_group]
name = "dg1"

[[ring_group.domain_group.versions]]
version_number = 1
domains = [
  { version = 2, domain = { name = "users", id = 1, partitioner = "modulo", num_partitions = 2, storage_engine = "version-marker" } },
]

[[ring_group.rings]]
ring_number = 1

[[ring_group.rings.hosts]]
address = { hostname = "localhost", port = 12345 }
domains = [{ domain_id = 1, partitions = [0, 1] }]
"#;

struct Harness {
    _dir: tempfile::TempDir,
    coordinator: Arc<LocalCoordinator>,
    daemon: Arc<UpdateDaemon<LocalCoordinator>>,
    router: Router,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(LocalCoordinator::open_in_memory().unwrap());
    coordinator
        .load_topology(&Topology::from_toml_str(TOPOLOGY).unwrap())
        .unwrap();

    let mut config = DaemonConfig::scaffold("rg1", 1);
    config.data_dir = dir.path().to_path_buf();
    let daemon = Arc::new(UpdateDaemon::new(
        config,
        HostAddress::new("localhost", 12345),
        Arc::clone(&coordinator),
        EngineRegistry::with_builtin(),
    ));
    let router = build_router(Arc::clone(&daemon));
    Harness {
        _dir: dir,
        coordinator,
        daemon,
        router,
    }
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn healthz_is_ok() {
    let h = harness();
    let (status, body) = send(&h.router, "GET", "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "ok");
}

#[tokio::test]
async fn status_of_a_fresh_host() {
    let h = harness();
    let (status, body) = send(&h.router, "GET", "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["host"]["hostname"], "localhost");
    assert_eq!(data["host"]["port"], 12345);
    assert_eq!(data["ring_group"], "rg1");
    assert_eq!(data["ring_number"], 1);
    assert_eq!(data["running"], false);
    assert_eq!(data["runs_completed"], 0);
    assert!(data["persisted_state"].is_null());
}

#[tokio::test]
async fn trigger_marks_host_updateable() {
    let h = harness();
    let (status, body) = send(&h.router, "POST", "/api/v1/trigger").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["data"]["revision"].as_u64().unwrap() > 0);

    assert_eq!(
        h.coordinator.get_daemon_state(h.daemon.key()).unwrap(),
        Some(DaemonState::Updateable)
    );
    let (_, body) = send(&h.router, "GET", "/api/v1/status").await;
    assert_eq!(body["data"]["persisted_state"], "updateable");
}

#[tokio::test]
async fn trigger_is_refused_unless_idle() {
    let h = harness();
    let (status, _) = send(&h.router, "POST", "/api/v1/trigger").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&h.router, "POST", "/api/v1/trigger").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("updateable"));

    h.coordinator
        .set_daemon_state(h.daemon.key(), DaemonState::Updating)
        .unwrap();
    let (status, _) = send(&h.router, "POST", "/api/v1/trigger").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_reflects_a_completed_run() {
    let h = harness();
    let (status, _) = send(&h.router, "POST", "/api/v1/trigger").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Pick up the pending request the way a starting daemon would.
    h.daemon.recover().await.unwrap();

    let (status, body) = send(&h.router, "GET", "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["state"], "idle");
    assert_eq!(data["persisted_state"], "idle");
    assert_eq!(data["runs_completed"], 1);
    assert_eq!(data["last_run"]["succeeded"], 2);
    assert_eq!(data["last_run"]["failed"].as_array().unwrap().len(), 0);

    // Idle again, so a new request is accepted.
    let (status, _) = send(&h.router, "POST", "/api/v1/trigger").await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let h = harness();
    let req = Request::builder()
        .uri("/api/v1/deployments")
        .body(Body::empty())
        .unwrap();
    let resp = h.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
