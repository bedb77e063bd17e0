//! Daily check-in counter models.

use serde::Serialize;

/// Response body for the daily counter endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub daily_check_in_count: i64,
    pub is_demo_mode: bool,
}

/// Result of a counter reset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetDailyCount {
    pub success: bool,
    pub is_demo_mode: bool,
}
