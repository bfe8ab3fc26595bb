//! HTTP endpoint handlers

use std::{sync::Arc, time::Duration};
use axum::{
    extract::{Query, State},
    response::Json,
};
use tracing::info;

use crate::state::{AppState, TimerView};
use super::responses::{
    ApiResponse, HealthResponse, NextQuery, ResetRequest, StartRequest, StatusResponse,
};

/// Default and maximum long-poll wait
const DEFAULT_WAIT: Duration = Duration::from_secs(30);
const MAX_WAIT: Duration = Duration::from_secs(120);

/// Handle POST /timer/start - Start or resume the timer
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartRequest>>,
) -> Json<ApiResponse> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let timer = state.start(request.into());
    info!("Start endpoint called - timer is {}", timer.run_state.as_str());
    let message = if timer.ended {
        "Timer started and already ended"
    } else {
        "Timer started"
    };
    Json(ApiResponse::new(message.to_string(), timer))
}

/// Handle POST /timer/pause - Freeze the timer
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let timer = state.pause();
    info!("Pause endpoint called - timer is {}", timer.run_state.as_str());
    let message = if timer.running {
        "Timer still running"
    } else {
        "Timer paused"
    };
    Json(ApiResponse::new(message.to_string(), timer))
}

/// Handle POST /timer/reset - Back to idle
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ResetRequest>>,
) -> Json<ApiResponse> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let timer = state.reset(request.into());
    info!("Reset endpoint called - timer shows {}ms", timer.value_ms);
    Json(ApiResponse::new("Timer reset".to_string(), timer))
}

/// Handle GET /timer - Current timer view
pub async fn timer_handler(State(state): State<Arc<AppState>>) -> Json<TimerView> {
    Json(state.view())
}

/// Handle GET /timer/next - Wait for the next change, then return the view
pub async fn next_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NextQuery>,
) -> Json<TimerView> {
    let wait = query
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_WAIT)
        .min(MAX_WAIT);
    Json(state.next_view(wait).await)
}

/// Handle GET /status - Timer plus host information
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        key: state.key.clone(),
        timer: state.view(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
