//! Check-in API endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};

use super::{error, success, ApiResult};
use crate::coordinator::CheckIn;
use crate::errors::AppError;
use crate::models::{CheckInRequest, CheckInResponse, Mode};
use crate::AppState;

/// POST /api/check-in - Record a scan or manual entry.
///
/// Unknown and ineligible ids are reported in the payload, not as HTTP errors.
pub async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<CheckInResponse> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    if request.id.trim().is_empty() {
        return error(
            AppError::Validation("Participant id is required".to_string()),
            generation,
        );
    }

    let at = match parse_timestamp(request.timestamp.as_deref()) {
        Ok(at) => at,
        Err(e) => return error(e, generation),
    };

    // The partition is authoritative; the client's idea of the mode is advisory
    let mode = match state.coordinator.current_mode().await {
        Ok(mode) => mode,
        Err(e) => return error(e, generation),
    };
    if let Some(requested) = request.is_demo_mode.map(Mode::from_demo_flag) {
        if requested != mode {
            tracing::warn!(
                requested = requested.as_str(),
                current = mode.as_str(),
                "Check-in mode disagrees with server mode; using server mode"
            );
        }
    }

    let outcome = state
        .coordinator
        .check_in(CheckIn {
            id: &request.id,
            at,
            mode,
            activity_name: request.activity_name.as_deref(),
        })
        .await;

    match outcome {
        Ok(outcome) => success(outcome.into(), generation),
        Err(e) => error(e, generation),
    }
}

/// Parse an RFC 3339 arrival time, defaulting to now.
fn parse_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| AppError::Validation(format!("Invalid timestamp {raw:?}: {e}"))),
    }
}
