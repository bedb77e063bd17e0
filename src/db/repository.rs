//! Database repository for the check-in state stores.
//!
//! Multi-row writes run inside transactions so a failure never leaves a
//! partially applied roster or a history append without its counter increment.

use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use crate::config::DailyResetPolicy;
use crate::errors::AppError;
use crate::models::{CheckInEntry, Mode, Participant, RosterSummary};

const PARTICIPANT_COLUMNS: &str =
    "id, name, english_name, voice_part, is_valid, check_ins, load_order, generation, version";

/// Point-in-time view of everything an export needs.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    pub participants: Vec<Participant>,
    pub activity_name: String,
    pub roster_generation: i64,
    pub mode: Mode,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== META ====================

    /// Get the current roster generation.
    pub async fn get_roster_generation(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT roster_generation FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("roster_generation"))
    }

    /// Get the mode partition.
    pub async fn get_mode(&self) -> Result<Mode, AppError> {
        let row = sqlx::query("SELECT is_demo_mode FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        let is_demo_mode: i32 = row.get("is_demo_mode");
        Ok(Mode::from_demo_flag(is_demo_mode != 0))
    }

    /// Set the mode partition. Participant records are untouched.
    pub async fn set_mode(&self, mode: Mode) -> Result<(), AppError> {
        sqlx::query("UPDATE meta SET is_demo_mode = ?, updated_at = ? WHERE id = 1")
            .bind(mode.is_demo() as i32)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get the name of the running activity.
    pub async fn get_activity_name(&self) -> Result<String, AppError> {
        let row = sqlx::query("SELECT activity_name FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("activity_name"))
    }

    // ==================== ROSTER ====================

    /// Number of participants in the live roster.
    pub async fn count_participants(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM participants")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    /// Get a participant by ID.
    pub async fn get_participant(&self, id: &str) -> Result<Option<Participant>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(participant_from_row).transpose()
    }

    /// List all participants in roster load order.
    pub async fn list_participants(&self) -> Result<Vec<Participant>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants ORDER BY load_order"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(participant_from_row).collect()
    }

    /// Atomically swap the roster for `participants`.
    ///
    /// The rows must already be validated. The new generation is stamped on
    /// every inserted row. `activity_name` of `None` keeps the current name.
    pub async fn replace_roster(
        &self,
        participants: &[Participant],
        activity_name: Option<&str>,
    ) -> Result<RosterSummary, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let meta = sqlx::query(
            r#"UPDATE meta
               SET roster_generation = roster_generation + 1,
                   activity_name = COALESCE(?, activity_name),
                   updated_at = ?
               WHERE id = 1
               RETURNING roster_generation, activity_name"#,
        )
        .bind(activity_name)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;
        let generation: i64 = meta.get("roster_generation");

        sqlx::query("DELETE FROM participants")
            .execute(&mut *tx)
            .await?;

        for (load_order, participant) in participants.iter().enumerate() {
            let check_ins_json = serde_json::to_string(&participant.check_ins)?;
            sqlx::query(
                "INSERT INTO participants (id, name, english_name, voice_part, is_valid, check_ins, load_order, generation, version, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)"
            )
            .bind(&participant.id)
            .bind(&participant.name)
            .bind(&participant.english_name)
            .bind(&participant.voice_part)
            .bind(participant.is_valid as i32)
            .bind(&check_ins_json)
            .bind(load_order as i64)
            .bind(generation)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(RosterSummary {
            total_people: participants.len() as i64,
            roster_generation: generation,
            current_activity_name: meta.get("activity_name"),
        })
    }

    /// Remove every participant and history.
    pub async fn clear_roster(&self) -> Result<RosterSummary, AppError> {
        let mut tx = self.pool.begin().await?;

        let meta = sqlx::query(
            "UPDATE meta SET roster_generation = roster_generation + 1, updated_at = ? WHERE id = 1 RETURNING roster_generation, activity_name",
        )
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM participants")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(RosterSummary {
            total_people: 0,
            roster_generation: meta.get("roster_generation"),
            current_activity_name: meta.get("activity_name"),
        })
    }

    // ==================== CHECK-INS ====================

    /// Append `entry` to the participant's history and bump the daily counter
    /// for the entry's mode, in one transaction. Returns the new daily count.
    ///
    /// `participant` is the record as read by the caller; the write only
    /// applies if the stored version and generation still match it.
    /// `counting_date` is the event-local day the check-in is processed on.
    pub async fn append_check_in(
        &self,
        participant: &Participant,
        entry: &CheckInEntry,
        counting_date: NaiveDate,
        daily_reset: DailyResetPolicy,
    ) -> Result<i64, AppError> {
        let mut history = participant.check_ins.clone();
        history.push(entry.clone());
        let check_ins_json = serde_json::to_string(&history)?;

        // Write first so the transaction takes the write lock up front
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE participants SET check_ins = ?, version = version + 1, updated_at = ? WHERE id = ? AND version = ? AND generation = ?"
        )
        .bind(&check_ins_json)
        .bind(Utc::now().to_rfc3339())
        .bind(&participant.id)
        .bind(participant.version)
        .bind(participant.generation)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let generation = self.get_roster_generation().await?;
            if generation != participant.generation {
                return Err(AppError::RosterChanged(format!(
                    "Roster changed (generation {} -> {}) during check-in of {}",
                    participant.generation, generation, participant.id
                )));
            }
            return Err(AppError::Conflict(format!(
                "Concurrent modification of participant {}",
                participant.id
            )));
        }

        let date = counting_date.to_string();
        let counter_sql = match daily_reset {
            DailyResetPolicy::Manual => {
                "UPDATE daily_counters SET count = count + 1, counting_date = ? WHERE mode = ? RETURNING count"
            }
            // Restart only on a later date; counting_date never moves backward
            DailyResetPolicy::Automatic => {
                "UPDATE daily_counters SET count = CASE WHEN counting_date IS NOT NULL AND counting_date >= ? THEN count + 1 ELSE 1 END, counting_date = MAX(COALESCE(counting_date, ?), ?) WHERE mode = ? RETURNING count"
            }
        };

        let mut counter = sqlx::query(counter_sql);
        if daily_reset == DailyResetPolicy::Automatic {
            counter = counter.bind(&date).bind(&date);
        }
        let row = counter
            .bind(&date)
            .bind(entry.mode.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let daily_count: i64 = row.get("count");

        tx.commit().await?;

        Ok(daily_count)
    }

    // ==================== DAILY COUNTER ====================

    /// Current count for `mode`. Under automatic rollover a count recorded
    /// for an earlier date reads as zero.
    pub async fn daily_count(
        &self,
        mode: Mode,
        today: NaiveDate,
        daily_reset: DailyResetPolicy,
    ) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT count, counting_date FROM daily_counters WHERE mode = ?")
            .bind(mode.as_str())
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        let counting_date: Option<String> = row.get("counting_date");

        match daily_reset {
            DailyResetPolicy::Automatic if counting_date != Some(today.to_string()) => Ok(0),
            _ => Ok(count),
        }
    }

    /// Reset the counter for `mode` to zero.
    pub async fn reset_daily_count(&self, mode: Mode, today: NaiveDate) -> Result<(), AppError> {
        sqlx::query("UPDATE daily_counters SET count = 0, counting_date = ? WHERE mode = ?")
            .bind(today.to_string())
            .bind(mode.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== EXPORT ====================

    /// Read the roster and its metadata from a single read transaction.
    pub async fn snapshot(&self) -> Result<RosterSnapshot, AppError> {
        let mut tx = self.pool.begin().await?;

        let meta = sqlx::query(
            "SELECT roster_generation, is_demo_mode, activity_name FROM meta WHERE id = 1",
        )
        .fetch_one(&mut *tx)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants ORDER BY load_order"
        ))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let participants = rows
            .iter()
            .map(participant_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let is_demo_mode: i32 = meta.get("is_demo_mode");

        Ok(RosterSnapshot {
            participants,
            activity_name: meta.get("activity_name"),
            roster_generation: meta.get("roster_generation"),
            mode: Mode::from_demo_flag(is_demo_mode != 0),
        })
    }
}

// ==================== HELPER FUNCTIONS ====================

fn participant_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Participant, AppError> {
    let is_valid: i32 = row.get("is_valid");
    let check_ins: String = row.get("check_ins");
    Ok(Participant {
        id: row.get("id"),
        name: row.get("name"),
        english_name: row.get("english_name"),
        voice_part: row.get("voice_part"),
        is_valid: is_valid != 0,
        check_ins: serde_json::from_str(&check_ins)?,
        version: row.get("version"),
        generation: row.get("generation"),
        load_order: row.get("load_order"),
    })
}
