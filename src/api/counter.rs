//! Daily counter API endpoints.

use axum::extract::{Query, State};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{DailyCount, Mode, ModeQuery, ResetDailyCount};
use crate::AppState;

/// GET /api/daily-check-in-count - Today's count for the current (or requested) mode.
pub async fn daily_check_in_count(
    State(state): State<AppState>,
    Query(query): Query<ModeQuery>,
) -> ApiResult<DailyCount> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    let result = async {
        let mode = resolve_mode(&state, &query).await?;
        let count = state.coordinator.daily_count(mode).await?;
        Ok::<_, AppError>(DailyCount {
            daily_check_in_count: count,
            is_demo_mode: mode.is_demo(),
        })
    }
    .await;

    match result {
        Ok(count) => success(count, generation),
        Err(e) => error(e, generation),
    }
}

/// POST /api/reset-daily-check-in-count - Zero the current (or requested) mode's count.
pub async fn reset_daily_check_in_count(
    State(state): State<AppState>,
    Query(query): Query<ModeQuery>,
) -> ApiResult<ResetDailyCount> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    let result = async {
        let mode = resolve_mode(&state, &query).await?;
        state.coordinator.reset_daily_count(mode).await?;
        Ok::<_, AppError>(mode)
    }
    .await;

    match result {
        Ok(mode) => success(
            ResetDailyCount {
                success: true,
                is_demo_mode: mode.is_demo(),
            },
            generation,
        ),
        Err(e) => error(e, generation),
    }
}

async fn resolve_mode(state: &AppState, query: &ModeQuery) -> Result<Mode, AppError> {
    match query.is_demo_mode {
        Some(is_demo_mode) => Ok(Mode::from_demo_flag(is_demo_mode)),
        None => state.coordinator.current_mode().await,
    }
}
