use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use home_dash_rs::push::{Dispatcher, PushError, PushTransport};
use home_dash_rs::scan::{ScanCommand, ScanCoordinator};
use home_dash_rs::server::{build_router, AppState};
use home_dash_rs::subs::SubscriptionStore;
use home_dash_rs::types::Subscription;

struct OkTransport;

#[async_trait]
impl PushTransport for OkTransport {
    async fn deliver(&self, _sub: &Subscription, _payload: &[u8]) -> Result<(), PushError> {
        Ok(())
    }
}

fn test_state(dir: &Path, command: ScanCommand) -> AppState {
    let store = SubscriptionStore::in_memory();
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(OkTransport));
    let scanner = ScanCoordinator::new(dir.join("lan-scan.json"), command, None);
    AppState {
        store,
        dispatcher,
        scanner,
        docker_program: "docker".into(),
    }
}

fn sleep_command() -> ScanCommand {
    ScanCommand {
        program: "sh".into(),
        args: vec!["-c".into(), "sleep 1".into()],
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn subscription_body(endpoint: &str) -> Value {
    json!({
        "endpoint": endpoint,
        "keys": { "p256dh": "BPubKey", "auth": "authSecret" }
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn subscribe_is_idempotent_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), sleep_command());
    let app = build_router(state.clone());

    for _ in 0..2 {
        let res = app
            .clone()
            .oneshot(post_json(
                "/api/notifications/subscribe",
                subscription_body("https://push/1"),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert_eq!(state.store.len().await, 1);
}

#[tokio::test]
async fn unsubscribe_removes_the_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), sleep_command());
    let app = build_router(state.clone());

    app.clone()
        .oneshot(post_json(
            "/api/notifications/subscribe",
            subscription_body("https://push/1"),
        ))
        .await
        .unwrap();
    let res = app
        .clone()
        .oneshot(post_json(
            "/api/notifications/unsubscribe",
            subscription_body("https://push/1"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(state.store.is_empty().await);
}

#[tokio::test]
async fn send_with_no_subscribers_is_a_soft_failure() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), sleep_command()));

    let res = app
        .oneshot(post_json(
            "/api/notifications/send",
            json!({ "message": "hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn send_reports_delivery_counts() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), sleep_command());
    let app = build_router(state.clone());

    app.clone()
        .oneshot(post_json(
            "/api/notifications/subscribe",
            subscription_body("https://push/1"),
        ))
        .await
        .unwrap();

    let res = app
        .oneshot(post_json(
            "/api/notifications/send",
            json!({ "message": "hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["delivered"], json!(1));
}

#[tokio::test]
async fn scan_read_before_first_scan_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), sleep_command()));

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/network/scan")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["devices"], json!([]));
}

#[tokio::test]
async fn scan_post_initiates_then_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), sleep_command());
    let app = build_router(state.clone());

    let res = app
        .clone()
        .oneshot(post_json(
            "/api/network/scan",
            json!({ "subnet": "10.0.0.0/30" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let res = app
        .clone()
        .oneshot(post_json(
            "/api/network/scan",
            json!({ "subnet": "10.0.0.0/30" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Let the background scan drain before the tempdir disappears.
    for _ in 0..200 {
        if !state.scanner.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn scan_post_rejects_bad_subnet() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), sleep_command());
    let app = build_router(state.clone());

    let res = app
        .oneshot(post_json(
            "/api/network/scan",
            json!({ "subnet": "192.168.1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(!state.scanner.is_running());
}

#[tokio::test]
async fn container_action_rejects_unknown_verbs() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path(), sleep_command()));

    let res = app
        .oneshot(post_json("/api/docker/containers/abc123/kill", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
