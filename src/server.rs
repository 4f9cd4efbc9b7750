use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    docker::{self, ContainerAction},
    push::{Dispatcher, SendOutcome},
    scan::{ScanCoordinator, ScanStart},
    subs::SubscriptionStore,
    types::{ScanResult, Subscription},
};

/// Everything the request handlers need, injected per instance so tests can
/// build a fresh state with fake collaborators.
#[derive(Clone)]
pub struct AppState {
    pub store: SubscriptionStore,
    pub dispatcher: Dispatcher,
    pub scanner: ScanCoordinator,
    pub docker_program: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanRequest {
    #[serde(default)]
    pub subnet: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScanResponse {
    #[serde(flatten)]
    result: ScanResult,
    #[serde(rename = "defaultSubnet")]
    default_subnet: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/notifications/subscribe", post(post_subscribe))
        .route("/notifications/unsubscribe", post(post_unsubscribe))
        .route("/notifications/send", post(post_send))
        .route("/network/scan", get(get_scan).post(post_scan))
        .route("/docker/containers", get(get_containers))
        .route(
            "/docker/containers/{id}/{action}",
            post(post_container_action),
        )
        .with_state(state);

    let static_svc = ServeDir::new("ui").append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, state: AppState) -> Result<()> {
    let app = build_router(state);
    info!("serving dashboard on http://{bind}");
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn post_subscribe(
    State(app): State<AppState>,
    Json(sub): Json<Subscription>,
) -> impl IntoResponse {
    info!(endpoint = %sub.endpoint, "subscribing user");
    match app.store.add(sub).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => internal_error("failed to store subscription", e),
    }
}

async fn post_unsubscribe(
    State(app): State<AppState>,
    Json(sub): Json<Subscription>,
) -> impl IntoResponse {
    info!(endpoint = %sub.endpoint, "unsubscribing user");
    match app.store.remove(&sub.endpoint).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => internal_error("failed to remove subscription", e),
    }
}

async fn post_send(
    State(app): State<AppState>,
    Json(req): Json<SendRequest>,
) -> impl IntoResponse {
    match app.dispatcher.send_all(&req.message).await {
        SendOutcome::NoRecipients => (
            StatusCode::OK,
            Json(json!({ "success": false, "error": "No subscriptions available" })),
        ),
        SendOutcome::Sent {
            delivered,
            pruned,
            failed,
        } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "delivered": delivered,
                "pruned": pruned,
                "failed": failed,
            })),
        ),
    }
}

async fn get_scan(State(app): State<AppState>) -> impl IntoResponse {
    match app.scanner.latest().await {
        Ok(result) => (
            StatusCode::OK,
            Json(ScanResponse {
                result,
                default_subnet: app.scanner.default_subnet().map(|n| n.to_string()),
            }),
        )
            .into_response(),
        Err(e) => internal_error("failed to read scan results", e),
    }
}

async fn post_scan(State(app): State<AppState>, body: String) -> impl IntoResponse {
    // The subnet override body is optional; an empty body means "use the
    // configured default or derive one".
    let subnet = if body.trim().is_empty() {
        None
    } else {
        match serde_json::from_str::<ScanRequest>(&body) {
            Ok(req) => req.subnet,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "message": "Invalid request body." })),
                )
                    .into_response()
            }
        }
    };
    match app.scanner.start(subnet.as_deref()).await {
        Ok(ScanStart::Initiated { subnet }) => (
            StatusCode::ACCEPTED,
            Json(json!({ "message": "Scan initiated", "subnet": subnet.to_string() })),
        )
            .into_response(),
        Ok(ScanStart::Conflict) => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "A scan is already in progress." })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": e.to_string() })),
        )
            .into_response(),
    }
}

async fn get_containers(State(app): State<AppState>) -> impl IntoResponse {
    match docker::list_containers(&app.docker_program).await {
        Ok(containers) => (StatusCode::OK, Json(containers)).into_response(),
        Err(e) => internal_error("error listing containers", e),
    }
}

async fn post_container_action(
    State(app): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(action) = ContainerAction::parse(&action) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid action." })),
        )
            .into_response();
    };

    match docker::container_action(&app.docker_program, &id, action).await {
        Ok(output) => (
            StatusCode::OK,
            Json(json!({
                "message": format!("Container {id} {}ed successfully.", action.as_str()),
                "output": output,
            })),
        )
            .into_response(),
        Err(e) => internal_error("container action failed", e),
    }
}

fn internal_error(message: &str, e: anyhow::Error) -> axum::response::Response {
    error!(error = %e, "{message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": message, "error": e.to_string() })),
    )
        .into_response()
}
