//! Check-in export API endpoint.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{error, success};
use crate::errors::AppErrorWithGeneration;
use crate::export::{content_disposition, ExportFormat};
use crate::AppState;

/// Export query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// GET /api/export-checkins - Download every participant's check-in history.
pub async fn export_check_ins(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppErrorWithGeneration> {
    let generation = state.repo.get_roster_generation().await.unwrap_or(0);

    let export = match state.coordinator.export().await {
        Ok(export) => export,
        Err(e) => return error::<()>(e, generation).map(IntoResponse::into_response),
    };

    tracing::info!(
        rows = export.rows.len(),
        total_people = export.total_people,
        "check-ins exported"
    );

    match params.format {
        ExportFormat::Json => {
            let generation = export.roster_generation;
            success(export, generation).map(IntoResponse::into_response)
        }
        ExportFormat::Csv => Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    content_disposition(&export.file_name()),
                ),
            ],
            export.to_csv(),
        )
            .into_response()),
    }
}
