//! REST API module.
//!
//! Contains all API routes and handlers. Every JSON response is wrapped in the
//! same envelope, stamped with the roster generation it was served under.

mod checkin;
mod counter;
mod export;
mod mode;
mod roster;

pub use checkin::*;
pub use counter::*;
pub use export::*;
pub use mode::*;
pub use roster::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithGeneration};

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub roster_generation: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, roster_generation: i64) -> Self {
        Self {
            success: true,
            data,
            roster_generation,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithGeneration>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, roster_generation: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, roster_generation))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, roster_generation: i64) -> ApiResult<T> {
    Err(AppErrorWithGeneration {
        error: err,
        roster_generation,
    })
}
