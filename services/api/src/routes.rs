use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use teremok::diagnostics::{
    diagnostics_router, DiagnosticRepository, DiagnosticService, OperatorNotifier, UserId,
};

pub(crate) fn with_diagnostic_routes<R, N>(service: Arc<DiagnosticService<R, N>>) -> axum::Router
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    diagnostics_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/subscriptions/:user_id",
            axum::routing::post(record_subscription_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Called by the bot once the messenger confirms the user joined the channel.
pub(crate) async fn record_subscription_endpoint(
    Extension(state): Extension<AppState>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    let Some(gate) = state.subscriptions else {
        let payload = json!({ "error": "subscription check is disabled" });
        return (StatusCode::NOT_FOUND, Json(payload));
    };

    gate.record_subscription(UserId(user_id));
    let payload = json!({
        "user_id": user_id,
        "channel": gate.channel(),
        "subscribed": true,
    });
    (StatusCode::OK, Json(payload))
}
