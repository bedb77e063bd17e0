//! Operating mode partition (demo rehearsal vs. live event).

use serde::{Deserialize, Serialize};

/// Which counting bucket check-ins land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Demo,
    Live,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Demo => "demo",
            Mode::Live => "live",
        }
    }

    pub fn from_demo_flag(is_demo_mode: bool) -> Self {
        if is_demo_mode {
            Mode::Demo
        } else {
            Mode::Live
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Mode::Demo)
    }
}

/// Current state of the mode partition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeInfo {
    pub is_demo_mode: bool,
}

/// Request body for switching modes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetModeRequest {
    pub is_demo_mode: bool,
    /// Admin password re-authorizing the switch
    #[serde(default)]
    pub password: Option<String>,
}

/// Result of a mode switch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetModeResponse {
    pub success: bool,
    pub is_demo_mode: bool,
}

/// Optional mode selector for counter endpoints; defaults to the current partition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeQuery {
    #[serde(default)]
    pub is_demo_mode: Option<bool>,
}
