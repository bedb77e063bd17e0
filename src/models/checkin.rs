//! Check-in request and outcome models.

use serde::{Deserialize, Serialize};

use super::Participant;

/// Request body for a scan or manual entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// Identifier decoded from the QR code or typed by the operator
    #[serde(alias = "qrData")]
    pub id: String,
    /// RFC 3339 arrival time; the server clock is used when absent
    #[serde(default, alias = "checkInTime")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub is_demo_mode: Option<bool>,
    #[serde(default)]
    pub activity_name: Option<String>,
}

/// Why a check-in was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    NotFound,
    Invalid,
    /// Same-day repeat under the strict once-per-day policy
    AlreadyCheckedIn,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::NotFound => "Participant not found",
            RejectReason::Invalid => "Participant is not eligible for check-in",
            RejectReason::AlreadyCheckedIn => "Participant has already checked in today",
        }
    }
}

/// Business result of a single check-in.
#[derive(Debug, Clone)]
pub enum CheckInOutcome {
    Accepted {
        participant: Participant,
        is_duplicate: bool,
        daily_count: i64,
        total_people: i64,
    },
    Rejected {
        reason: RejectReason,
        daily_count: i64,
        total_people: i64,
    },
}

/// Accepted or rejected, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckInStatus {
    Accepted,
    Rejected,
}

/// Response body for a check-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub status: CheckInStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<Participant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    pub is_duplicate: bool,
    pub daily_check_in_count: i64,
    pub total_people: i64,
}

impl From<CheckInOutcome> for CheckInResponse {
    fn from(outcome: CheckInOutcome) -> Self {
        match outcome {
            CheckInOutcome::Accepted {
                participant,
                is_duplicate,
                daily_count,
                total_people,
            } => Self {
                status: CheckInStatus::Accepted,
                message: if is_duplicate {
                    "Check-in recorded (already checked in today)".to_string()
                } else {
                    "Check-in successful".to_string()
                },
                participant: Some(participant),
                reason: None,
                is_duplicate,
                daily_check_in_count: daily_count,
                total_people,
            },
            CheckInOutcome::Rejected {
                reason,
                daily_count,
                total_people,
            } => Self {
                status: CheckInStatus::Rejected,
                message: reason.message().to_string(),
                participant: None,
                reason: Some(reason),
                is_duplicate: reason == RejectReason::AlreadyCheckedIn,
                daily_check_in_count: daily_count,
                total_people,
            },
        }
    }
}
