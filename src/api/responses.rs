//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{ResetOptions, StartOptions},
    state::TimerView,
};

/// Response for timer actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerView,
}

impl ApiResponse {
    /// Create a new API response; status follows the timer's run state
    pub fn new(message: String, timer: TimerView) -> Self {
        Self {
            status: timer.run_state.as_str().to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }
}

/// Status response with host information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub key: String,
    pub timer: TimerView,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of `POST /timer/start`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub duration_ms: Option<i64>,
    pub end_at_ms: Option<i64>,
    pub start_at_ms: Option<i64>,
}

impl From<StartRequest> for StartOptions {
    fn from(request: StartRequest) -> Self {
        StartOptions {
            duration_ms: request.duration_ms,
            end_at_ms: request.end_at_ms,
            start_at_ms: request.start_at_ms,
        }
    }
}

/// Body of `POST /timer/reset`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub duration_ms: Option<i64>,
}

impl From<ResetRequest> for ResetOptions {
    fn from(request: ResetRequest) -> Self {
        ResetOptions {
            duration_ms: request.duration_ms,
        }
    }
}

/// Query of `GET /timer/next`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuery {
    /// Longest wait in milliseconds
    pub timeout_ms: Option<u64>,
}
