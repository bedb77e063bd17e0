//! Check-in coordinator.
//!
//! Decides the outcome of each scan and applies it to the state stores.
//!
//! # Locking
//!
//! - A roster gate (`RwLock<()>`): check-ins and exports hold the read side,
//!   roster replace and clear hold the write side, so a roster swap never
//!   interleaves with a check-in.
//! - A lock table keyed by participant id: the read-modify-write of one
//!   participant's history is serialized, while different ids never contend.
//!   Unknown and ineligible ids are rejected before an entry is created.
//! - The daily counter is a single atomic SQL increment in the same
//!   transaction as the history append; no coordinator lock guards it.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::config::{Config, DailyResetPolicy, DemoExportPolicy, DuplicatePolicy};
use crate::db::Repository;
use crate::errors::AppError;
use crate::export::{self, CheckInExport};
use crate::models::{
    CheckInEntry, CheckInOutcome, Mode, Participant, RejectReason, RosterRow, RosterSummary,
};
use crate::roster;

/// Policy knobs that shape check-in behaviour.
#[derive(Debug, Clone, Copy)]
pub struct CheckInPolicy {
    pub event_offset: FixedOffset,
    pub duplicate_policy: DuplicatePolicy,
    pub daily_reset: DailyResetPolicy,
    pub demo_export: DemoExportPolicy,
}

impl From<&Config> for CheckInPolicy {
    fn from(config: &Config) -> Self {
        Self {
            event_offset: config.event_offset,
            duplicate_policy: config.duplicate_policy,
            daily_reset: config.daily_reset,
            demo_export: config.demo_export,
        }
    }
}

/// A single scan or manual entry.
#[derive(Debug, Clone, Copy)]
pub struct CheckIn<'a> {
    pub id: &'a str,
    pub at: DateTime<Utc>,
    pub mode: Mode,
    /// Metadata only; does not scope the lookup
    pub activity_name: Option<&'a str>,
}

pub struct CheckInCoordinator {
    repo: Arc<Repository>,
    policy: CheckInPolicy,
    roster_gate: RwLock<()>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CheckInCoordinator {
    pub fn new(repo: Arc<Repository>, policy: CheckInPolicy) -> Self {
        Self {
            repo,
            policy,
            roster_gate: RwLock::new(()),
            locks: DashMap::new(),
        }
    }

    /// Calendar date of `at` in event local time.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.policy.event_offset).date_naive()
    }

    fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    // ==================== CHECK-IN ====================

    /// Validate and record one check-in.
    ///
    /// Unknown, ineligible and (under the strict policy) repeat scans come back
    /// as [`CheckInOutcome::Rejected`] with nothing changed. Storage faults are
    /// returned as errors without retry; the history append and the counter
    /// increment either both happen or neither does.
    pub async fn check_in(&self, request: CheckIn<'_>) -> Result<CheckInOutcome, AppError> {
        let id = request.id.trim();
        let local_date = self.local_date(request.at);
        // The counter follows the server's day, whatever the scan's timestamp
        let today = self.today();
        let _roster = self.roster_gate.read().await;

        let Some(found) = self.repo.get_participant(id).await? else {
            tracing::info!(participant_id = %id, mode = request.mode.as_str(), "check-in rejected: unknown id");
            return self.rejected(RejectReason::NotFound, request.mode, today).await;
        };
        if !found.is_valid {
            tracing::info!(participant_id = %id, mode = request.mode.as_str(), "check-in rejected: participant not eligible");
            return self.rejected(RejectReason::Invalid, request.mode, today).await;
        }

        let lock = self.lock_for(id);
        let _participant_guard = lock.lock().await;

        // Re-read under the per-id lock so the history is current
        let participant = self.repo.get_participant(id).await?.ok_or_else(|| {
            AppError::RosterChanged(format!("Participant {id} left the roster during check-in"))
        })?;

        let is_duplicate = participant.checked_in_on(local_date, &self.policy.event_offset);
        if is_duplicate && self.policy.duplicate_policy == DuplicatePolicy::Reject {
            tracing::info!(participant_id = %id, %local_date, "check-in rejected: already checked in today");
            return self
                .rejected(RejectReason::AlreadyCheckedIn, request.mode, today)
                .await;
        }

        let entry = CheckInEntry {
            at: request.at,
            mode: request.mode,
        };
        let daily_count = self
            .repo
            .append_check_in(&participant, &entry, today, self.policy.daily_reset)
            .await?;
        let total_people = self.repo.count_participants().await?;

        let mut participant = participant;
        participant.check_ins.push(entry);
        participant.version += 1;

        tracing::info!(
            participant_id = %id,
            mode = request.mode.as_str(),
            activity = request.activity_name.unwrap_or_default(),
            is_duplicate,
            daily_count,
            "check-in accepted"
        );

        Ok(CheckInOutcome::Accepted {
            participant,
            is_duplicate,
            daily_count,
            total_people,
        })
    }

    async fn rejected(
        &self,
        reason: RejectReason,
        mode: Mode,
        today: NaiveDate,
    ) -> Result<CheckInOutcome, AppError> {
        let daily_count = self
            .repo
            .daily_count(mode, today, self.policy.daily_reset)
            .await?;
        let total_people = self.repo.count_participants().await?;
        Ok(CheckInOutcome::Rejected {
            reason,
            daily_count,
            total_people,
        })
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(id.to_string()).or_default().clone()
    }

    // ==================== ROSTER ====================

    /// Validate `rows` and atomically install them as the new roster.
    pub async fn replace_roster(
        &self,
        rows: Vec<RosterRow>,
        activity_name: Option<&str>,
    ) -> Result<RosterSummary, AppError> {
        let participants = roster::validate_rows(rows)?;

        let _roster = self.roster_gate.write().await;
        let summary = self.repo.replace_roster(&participants, activity_name).await?;
        self.locks.clear();

        tracing::info!(
            total_people = summary.total_people,
            generation = summary.roster_generation,
            activity = %summary.current_activity_name,
            "roster replaced"
        );
        Ok(summary)
    }

    /// Remove every participant and check-in history.
    pub async fn clear_roster(&self) -> Result<RosterSummary, AppError> {
        let _roster = self.roster_gate.write().await;
        let summary = self.repo.clear_roster().await?;
        self.locks.clear();

        tracing::info!(generation = summary.roster_generation, "roster cleared");
        Ok(summary)
    }

    /// Get a single participant.
    pub async fn participant(&self, id: &str) -> Result<Option<Participant>, AppError> {
        self.repo.get_participant(id.trim()).await
    }

    /// All participants, most recent check-in first.
    pub async fn participants(&self) -> Result<Vec<Participant>, AppError> {
        let mut participants = self.repo.list_participants().await?;
        roster::sort_by_recent_check_in(&mut participants);
        Ok(participants)
    }

    pub async fn total_people(&self) -> Result<i64, AppError> {
        self.repo.count_participants().await
    }

    pub async fn activity_name(&self) -> Result<String, AppError> {
        self.repo.get_activity_name().await
    }

    // ==================== MODE & COUNTER ====================

    pub async fn current_mode(&self) -> Result<Mode, AppError> {
        self.repo.get_mode().await
    }

    /// Switch the mode partition. The caller is responsible for re-authorization.
    pub async fn set_mode(&self, mode: Mode) -> Result<(), AppError> {
        self.repo.set_mode(mode).await?;
        tracing::info!(mode = mode.as_str(), "mode switched");
        Ok(())
    }

    pub async fn daily_count(&self, mode: Mode) -> Result<i64, AppError> {
        self.repo
            .daily_count(mode, self.today(), self.policy.daily_reset)
            .await
    }

    pub async fn reset_daily_count(&self, mode: Mode) -> Result<(), AppError> {
        self.repo.reset_daily_count(mode, self.today()).await?;
        tracing::info!(mode = mode.as_str(), "daily check-in count reset");
        Ok(())
    }

    // ==================== EXPORT ====================

    /// Flattened point-in-time export of the roster and its histories.
    pub async fn export(&self) -> Result<CheckInExport, AppError> {
        let snapshot = {
            let _roster = self.roster_gate.read().await;
            self.repo.snapshot().await?
        };
        Ok(export::reconcile(&snapshot, &self.policy, Utc::now()))
    }
}
