// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use switchboard_core::HealthStatus;
use switchboard_engine::{MetricsSnapshot, ProcessorStatus};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", "degraded" or "unhealthy".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub uptime_secs: u64,
}

/// Query string for GET /v1/metrics.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub window_minutes: Option<u64>,
}

/// Response body for the metrics endpoints.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub window_minutes: u64,
    #[serde(flatten)]
    pub snapshot: MetricsSnapshot,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// GET /health
///
/// Aggregated collaborator health. Unhealthy maps to 503 so load balancers
/// and systemd watchdogs can act on the status code alone.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let uptime_secs = state.health.start_time.elapsed().as_secs();
    let (code, status, detail) = match state.processor.health().await {
        HealthStatus::Healthy => (StatusCode::OK, "ok", None),
        HealthStatus::Degraded(reason) => (StatusCode::OK, "degraded", Some(reason)),
        HealthStatus::Unhealthy(reason) => {
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Some(reason))
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            detail,
            uptime_secs,
        }),
    )
        .into_response()
}

/// GET /metrics
///
/// Prometheus exposition text, or 404 when no exporter is installed.
pub async fn get_prometheus(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "prometheus exporter not enabled".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /v1/status
pub async fn get_status(State(state): State<GatewayState>) -> Json<ProcessorStatus> {
    Json(state.processor.status())
}

/// GET /v1/metrics?window_minutes=N
pub async fn get_metrics(
    State(state): State<GatewayState>,
    Query(query): Query<MetricsQuery>,
) -> Json<MetricsResponse> {
    let window_minutes = query
        .window_minutes
        .unwrap_or(state.report_window_minutes);
    metrics_over(&state, window_minutes).await
}

/// GET /v1/metrics/live
pub async fn get_live_metrics(State(state): State<GatewayState>) -> Json<MetricsResponse> {
    let window_minutes = state.live_window_minutes;
    metrics_over(&state, window_minutes).await
}

async fn metrics_over(state: &GatewayState, window_minutes: u64) -> Json<MetricsResponse> {
    let snapshot = state.processor.metrics().get_metrics(window_minutes).await;
    Json(MetricsResponse {
        window_minutes,
        snapshot,
    })
}
