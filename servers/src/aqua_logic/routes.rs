use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use lib_telemetry::core::service::DEFAULT_RECENT_LIMIT;
use lib_telemetry::{ClearSummary, LatestReading, RawReading, RecentBatch, ValidationError};

use crate::aqua_logic::state::AppState;

/// Route-layer error, mapped onto the wire taxonomy.
pub enum AppError {
    Validation(ValidationError),
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(e) => {
                log::warn!("Rejected submission: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": e.name(), "message": e.to_string() }),
                )
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "NotFound", "message": "no sensor data available yet" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn health() -> &'static str {
    "OK"
}

/// The accept path. The body is parsed from raw bytes so that a missing
/// or non-numeric field maps to the MalformedInput constraint instead of
/// a framework rejection.
pub async fn submit_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let raw: RawReading = serde_json::from_slice(&body)
        .map_err(|_| AppError::Validation(ValidationError::MalformedInput))?;

    if let Some(ts) = &raw.timestamp {
        // Informational only; ordering always uses the server clock.
        log::debug!("Ignoring client-supplied timestamp {}", ts);
    }

    let accepted = state.service.accept(raw).map_err(AppError::Validation)?;
    log::info!(
        "Reading accepted from '{}': ph {} | turbidity {} NTU | next ph ~{}",
        accepted.reading.device_id,
        accepted.reading.ph,
        accepted.reading.turbidity,
        accepted.predicted_next_ph
    );

    // Detached persistence: a slow or failing store must never delay the
    // accept response or the broadcast.
    if let Some(db) = &state.db {
        let db = Arc::clone(db);
        let reading = accepted.reading.clone();
        tokio::spawn(async move {
            if let Err(e) = db.insert_reading(&reading).await {
                log::error!("Failed to persist reading {}: {}", reading.id, e);
            }
        });
    }

    Ok((StatusCode::CREATED, Json(accepted)))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

pub async fn recent_readings(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> impl IntoResponse {
    let readings = state.service.recent(params.limit.unwrap_or(DEFAULT_RECENT_LIMIT));
    Json(RecentBatch {
        count: readings.len(),
        readings,
    })
}

pub async fn latest_reading(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let reading = state.service.latest().ok_or(AppError::NotFound)?;
    Ok(Json(LatestReading { reading }))
}

pub async fn gateway_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.status())
}

pub async fn clear_readings(State(state): State<AppState>) -> impl IntoResponse {
    let cleared_count = state.service.clear();
    Json(ClearSummary { cleared_count })
}
