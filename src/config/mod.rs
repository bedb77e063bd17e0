//! Configuration module for the check-in backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;
use thiserror::Error;

use crate::models::Mode;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Whether the daily counter rolls over on its own at local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyResetPolicy {
    /// Only an explicit reset clears the count.
    Manual,
    /// The first increment on a new local date restarts the count.
    Automatic,
}

/// What happens when a participant is scanned twice on the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Record the scan and mark the outcome as a duplicate.
    Flag,
    /// Refuse the scan without recording it.
    Reject,
}

/// Whether demo-mode check-ins appear in exports taken while live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoExportPolicy {
    Include,
    ExcludeInLive,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Password required to switch between demo and live mode
    pub admin_password: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Offset of the event's local time zone from UTC
    pub event_offset: FixedOffset,
    /// Mode the partition is reset to at start-up
    pub default_mode: Mode,
    pub daily_reset: DailyResetPolicy,
    pub duplicate_policy: DuplicatePolicy,
    pub demo_export: DemoExportPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_psk = lookup("CHECKIN_API_PSK").filter(|s| !s.is_empty());
        let admin_password = lookup("CHECKIN_ADMIN_PASSWORD").filter(|s| !s.is_empty());

        let db_path = lookup("CHECKIN_DB_PATH")
            .unwrap_or_else(|| "./data/checkin.sqlite".to_string())
            .into();

        let raw_addr = lookup("CHECKIN_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3001".to_string());
        let bind_addr = raw_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid("CHECKIN_BIND_ADDR", &raw_addr, e))?;

        let log_level = lookup("CHECKIN_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let raw_offset = lookup("CHECKIN_UTC_OFFSET_MINUTES").unwrap_or_else(|| "480".to_string());
        let minutes: i32 = raw_offset
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| invalid("CHECKIN_UTC_OFFSET_MINUTES", &raw_offset, e))?;
        let event_offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| invalid("CHECKIN_UTC_OFFSET_MINUTES", &raw_offset, "out of range"))?;

        let default_mode = match lookup("CHECKIN_DEFAULT_DEMO_MODE") {
            None => Mode::Demo,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Mode::Demo,
                "false" | "0" | "no" => Mode::Live,
                _ => return Err(invalid("CHECKIN_DEFAULT_DEMO_MODE", &raw, "expected a boolean")),
            },
        };

        let daily_reset = match lookup("CHECKIN_DAILY_RESET") {
            None => DailyResetPolicy::Manual,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "manual" => DailyResetPolicy::Manual,
                "automatic" | "auto" => DailyResetPolicy::Automatic,
                _ => return Err(invalid("CHECKIN_DAILY_RESET", &raw, "expected manual or automatic")),
            },
        };

        let duplicate_policy = match lookup("CHECKIN_DUPLICATE_POLICY") {
            None => DuplicatePolicy::Flag,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "flag" => DuplicatePolicy::Flag,
                "reject" => DuplicatePolicy::Reject,
                _ => return Err(invalid("CHECKIN_DUPLICATE_POLICY", &raw, "expected flag or reject")),
            },
        };

        let demo_export = match lookup("CHECKIN_EXPORT_DEMO_CHECKINS") {
            None => DemoExportPolicy::Include,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "include" => DemoExportPolicy::Include,
                "exclude-in-live" => DemoExportPolicy::ExcludeInLive,
                _ => {
                    return Err(invalid(
                        "CHECKIN_EXPORT_DEMO_CHECKINS",
                        &raw,
                        "expected include or exclude-in-live",
                    ))
                }
            },
        };

        Ok(Self {
            api_psk,
            admin_password,
            db_path,
            bind_addr,
            log_level,
            event_offset,
            default_mode,
            daily_reset,
            duplicate_policy,
            demo_export,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
