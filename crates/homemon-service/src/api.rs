//! REST API endpoints for the homemon-service.
//!
//! Handlers are thin: each one calls a single [`AppState`] operation and
//! shapes the result. The store lock is never held across the aggregation
//! engine; see [`crate::state`].
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Store errors
//! return HTTP 500, an empty statistics window returns 404, and malformed
//! request bodies return 400.
//!
//! # Example
//!
//! ```ignore
//! use homemon_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, delete, get, post},
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::error;

use homemon_types::{AggregateError, NewReading, Reading, WindowStats};

use crate::state::{AppState, PurgeStats, StatsError};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/api/health", get(health))
        .route("/api/health/detailed", get(health_detailed))
        // Sensor data
        .route("/api/sensordata", post(ingest))
        .route("/api/sensordata/latest", get(latest))
        .route("/api/sensordata/last24hours", get(last_24_hours))
        .route("/api/sensordata/stats", get(stats))
        .route("/api/sensordata/clear", delete(clear_stale))
        .route("/api/sensordata/clearall", delete(clear_all))
        // Keep unknown API paths out of the dashboard fallback
        .route("/api/{*path}", any(unknown_endpoint))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Detailed health check response with diagnostics.
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Database health status
    pub database: DatabaseHealth,
    /// Purge task status
    pub purge: PurgeHealth,
    /// Platform information
    pub platform: PlatformInfo,
}

/// Database health information.
#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    /// Whether the store answered
    pub ok: bool,
    /// Number of stored readings
    pub reading_count: Option<u64>,
    /// Error message if the store is not ok
    pub error: Option<String>,
}

/// Purge task health information.
#[derive(Debug, Serialize)]
pub struct PurgeHealth {
    /// Whether automatic purging is configured
    pub enabled: bool,
    /// Whether the task is running
    pub running: bool,
    /// Seconds between purges
    pub interval_secs: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub stats: PurgeStats,
}

/// Platform information.
#[derive(Debug, Serialize)]
pub struct PlatformInfo {
    /// Operating system
    pub os: &'static str,
    /// CPU architecture
    pub arch: &'static str,
}

/// Detailed health check endpoint.
///
/// Counts stored readings, so it takes the store lock once.
async fn health_detailed(State(state): State<Arc<AppState>>) -> Json<DetailedHealthResponse> {
    let database = match state.reading_count().await {
        Ok(count) => DatabaseHealth {
            ok: true,
            reading_count: Some(count),
            error: None,
        },
        Err(e) => DatabaseHealth {
            ok: false,
            reading_count: None,
            error: Some(e.to_string()),
        },
    };

    let purge = {
        let config = state.config.read().await;
        let enabled = config.retention.auto_purge;
        let interval_secs = config.retention.purge_interval_secs;
        drop(config);

        PurgeHealth {
            enabled,
            running: state.purge.is_running(),
            interval_secs,
            started_at: state.purge.started_at(),
            stats: state.purge.stats.read().await.clone(),
        }
    };

    let platform = PlatformInfo {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
    };

    let status = if !database.ok {
        "unhealthy"
    } else if purge.enabled && !purge.running {
        "degraded"
    } else {
        "ok"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        database,
        purge,
        platform,
    })
}

/// Response for a successful ingest.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
    pub reading: Reading,
}

/// Store one reading.
async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewReading>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(reading) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let reading = state.ingest(reading).await.map_err(ingest_error)?;

    Ok(Json(IngestResponse {
        message: "Data added successfully",
        reading,
    }))
}

/// A reading the store refuses is the client's fault; anything else is ours.
fn ingest_error(e: homemon_store::Error) -> AppError {
    match e {
        homemon_store::Error::InvalidTimestamp(_) => AppError::BadRequest(e.to_string()),
        e => AppError::Store(e),
    }
}

/// The most recent reading; 204 when nothing is stored.
async fn latest(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    Ok(match state.latest().await? {
        Some(reading) => Json(reading).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// The last 24 hours, one reading per minute, oldest first.
async fn last_24_hours(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Reading>>, AppError> {
    Ok(Json(state.window().await?))
}

/// Per-metric statistics over the last 24 hours.
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<WindowStats>, AppError> {
    Ok(Json(state.stats().await?))
}

/// Response for the purge endpoints.
#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub message: &'static str,
    pub deleted: u64,
}

/// Delete readings older than 24 hours.
async fn clear_stale(State(state): State<Arc<AppState>>) -> Result<Json<PurgeResponse>, AppError> {
    let deleted = state.purge_stale().await?;
    Ok(Json(PurgeResponse {
        message: "Old data has been cleared",
        deleted,
    }))
}

/// Delete every reading.
async fn clear_all(State(state): State<Arc<AppState>>) -> Result<Json<PurgeResponse>, AppError> {
    let deleted = state.purge_all().await?;
    Ok(Json(PurgeResponse {
        message: "All data has been cleared",
        deleted,
    }))
}

async fn unknown_endpoint(uri: Uri) -> AppError {
    AppError::NotFound(format!("No such endpoint: {}", uri.path()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// The statistics window holds no readings.
    NoData,
    Store(homemon_store::Error),
}

impl From<homemon_store::Error> for AppError {
    fn from(e: homemon_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl From<StatsError> for AppError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::Store(e) => AppError::Store(e),
            StatsError::Aggregate(_) => AppError::NoData,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NoData => (
                StatusCode::NOT_FOUND,
                AggregateError::EmptyWindow.to_string(),
            ),
            AppError::Store(e) => {
                error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
