//! Mode partition API endpoints.

use axum::{extract::State, Json};

use super::{error, success, ApiResult};
use crate::auth::verify_admin_password;
use crate::models::{Mode, ModeInfo, SetModeRequest, SetModeResponse};
use crate::AppState;

/// GET /api/mode - Current mode partition.
pub async fn get_mode(State(state): State<AppState>) -> ApiResult<ModeInfo> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    match state.coordinator.current_mode().await {
        Ok(mode) => success(
            ModeInfo {
                is_demo_mode: mode.is_demo(),
            },
            generation,
        ),
        Err(e) => error(e, generation),
    }
}

/// POST /api/set-mode - Switch between demo and live; requires the admin password.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(request): Json<SetModeRequest>,
) -> ApiResult<SetModeResponse> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    if let Err(e) = verify_admin_password(
        state.config.admin_password.as_deref(),
        request.password.as_deref(),
    ) {
        tracing::warn!("Rejected mode switch: {}", e);
        return error(e, generation);
    }

    let mode = Mode::from_demo_flag(request.is_demo_mode);
    match state.coordinator.set_mode(mode).await {
        Ok(()) => success(
            SetModeResponse {
                success: true,
                is_demo_mode: mode.is_demo(),
            },
            generation,
        ),
        Err(e) => error(e, generation),
    }
}
