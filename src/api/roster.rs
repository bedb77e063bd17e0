//! Roster and activity API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CurrentActivity, Participant, RosterSummary, TotalPeople, UploadRosterRequest};
use crate::AppState;

/// GET /api/participants - List participants, most recent check-in first.
pub async fn list_participants(State(state): State<AppState>) -> ApiResult<Vec<Participant>> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    match state.coordinator.participants().await {
        Ok(participants) => success(participants, generation),
        Err(e) => error(e, generation),
    }
}

/// GET /api/participants/:id - Get a single participant.
pub async fn get_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Participant> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    match state.coordinator.participant(&id).await {
        Ok(Some(participant)) => success(participant, generation),
        Ok(None) => error(
            AppError::NotFound(format!("Participant {} not found", id)),
            generation,
        ),
        Err(e) => error(e, generation),
    }
}

/// POST /api/upload-roster - Replace the roster and set the activity name.
pub async fn upload_roster(
    State(state): State<AppState>,
    Json(request): Json<UploadRosterRequest>,
) -> ApiResult<RosterSummary> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);
    let activity_name = request.activity_name.as_deref().map(str::trim);

    match state
        .coordinator
        .replace_roster(request.participants, activity_name)
        .await
    {
        Ok(summary) => {
            let new_generation = summary.roster_generation;
            success(summary, new_generation)
        }
        Err(e) => error(e, generation),
    }
}

/// POST /api/clear-roster - Remove all participants and their histories.
pub async fn clear_roster(State(state): State<AppState>) -> ApiResult<RosterSummary> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    match state.coordinator.clear_roster().await {
        Ok(summary) => {
            let new_generation = summary.roster_generation;
            success(summary, new_generation)
        }
        Err(e) => error(e, generation),
    }
}

/// GET /api/total-people - Size of the live roster.
pub async fn total_people(State(state): State<AppState>) -> ApiResult<TotalPeople> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    match state.coordinator.total_people().await {
        Ok(total_people) => success(TotalPeople { total_people }, generation),
        Err(e) => error(e, generation),
    }
}

/// GET /api/current-activity - Name of the running activity.
pub async fn current_activity(State(state): State<AppState>) -> ApiResult<CurrentActivity> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    match state.coordinator.activity_name().await {
        Ok(current_activity_name) => success(
            CurrentActivity {
                current_activity_name,
            },
            generation,
        ),
        Err(e) => error(e, generation),
    }
}
