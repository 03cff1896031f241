//! API integration tests
//!
//! Tests for the HTTP endpoints around the upload flow using axum's test
//! utilities.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_to_json, body_to_string, TestHarness};
use tower::ServiceExt;
use vidladder::server::create_router;

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_health_endpoint() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_when_idle() {
    let harness = TestHarness::with_script("exit 0\n");
    let _listener = harness.ctx.events.connect();

    let response = harness
        .router()
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["running"], false);
    assert!(json["job"].is_null());
    assert_eq!(json["listeners"], 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_status_reports_running_job() {
    let harness = TestHarness::with_script("exec sleep 30\n");
    let input = harness.stage_input("clip.mp4");
    let job = harness
        .ctx
        .coordinator
        .start(
            vidladder_common::JobName::parse("clip").unwrap(),
            &input,
            harness.output_dir(),
        )
        .unwrap();

    let response = harness
        .router()
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["running"], true);
    assert_eq!(json["job"]["name"], "clip");
    assert_eq!(json["job"]["id"], job.handle.id.to_string());

    assert!(harness.ctx.coordinator.cancel());
    job.drive(|_, _| {}).await.unwrap();
}

#[tokio::test]
async fn test_cancel_when_idle() {
    let harness = TestHarness::with_script("exit 0\n");
    let mut listener = harness.ctx.events.connect();

    let response = harness
        .router()
        .oneshot(Request::post("/api/cancel").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cancelled"], false);
    assert!(common::drain(&mut listener).is_empty());
}

#[tokio::test]
async fn test_tools_endpoint_lists_shell_and_ffprobe() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let names: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["bash", "ffprobe", "ffmpeg"]);
}

#[tokio::test]
async fn test_open_requires_path() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(Request::post("/output/open").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_open_rejects_paths_outside_output() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(
            Request::post("/output/open?path=..%2Fuploads")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["code"], "validation_error");
}

#[cfg(unix)]
#[tokio::test]
async fn test_open_runs_opener_for_job_folder() {
    // The harness opener is `true`, which always succeeds
    let harness = TestHarness::with_script("exit 0\n");
    std::fs::create_dir(harness.output_dir().join("clip")).unwrap();

    let response = harness
        .router()
        .oneshot(
            Request::post("/output/open?path=clip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await["success"], true);
}

#[tokio::test]
async fn test_missing_output_file_is_404() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(
            Request::get("/output/nothing/here.m3u8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(harness.ctx.events.listener_count(), 0);
}

#[tokio::test]
async fn test_spa_fallback_serves_index() {
    let harness = TestHarness::with_script("exit 0\n");
    let static_dir = harness.temp.path().join("dist");
    std::fs::create_dir(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<html>ladder</html>").unwrap();

    let app = create_router(harness.ctx.clone(), Some(static_dir));

    let response = app
        .oneshot(
            Request::get("/some/client/route")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "<html>ladder</html>");
}

#[tokio::test]
async fn test_unknown_route_without_static_dir_is_404() {
    let harness = TestHarness::with_script("exit 0\n");

    let response = harness
        .router()
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
