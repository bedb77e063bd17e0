//! Roster validation and ordering.
//!
//! Uploaded rows are validated in full before anything is written, so a bad
//! upload leaves the previous roster untouched.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{CheckInEntry, Mode, Participant, RosterRow};

/// Turn uploaded rows into participants, rejecting the whole upload on the
/// first missing id, duplicate id or unreadable timestamp.
pub fn validate_rows(rows: Vec<RosterRow>) -> Result<Vec<Participant>, AppError> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut participants = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        // Rows are reported 1-based, as a spreadsheet user would count them
        let line = index + 1;

        let id = row
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Validation(format!("Row {line} is missing an id")))?
            .to_string();

        if !seen.insert(id.clone()) {
            return Err(AppError::Validation(format!(
                "Duplicate participant id {id:?} at row {line}"
            )));
        }

        let check_ins = row
            .check_ins
            .iter()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .map(|at| CheckInEntry {
                        at: at.with_timezone(&Utc),
                        mode: Mode::Live,
                    })
                    .map_err(|e| {
                        AppError::Validation(format!(
                            "Row {line} has an invalid check-in time {raw:?}: {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        participants.push(Participant {
            id,
            name: row.name.trim().to_string(),
            english_name: row.english_name.trim().to_string(),
            voice_part: row.voice_part.trim().to_string(),
            is_valid: row.is_valid,
            check_ins,
            version: 1,
            generation: 0,
            load_order: index as i64,
        });
    }

    Ok(participants)
}

/// Order participants most-recent-check-in first.
///
/// Participants without check-ins go last; ties fall back to roster load
/// order, then to their current relative order.
pub fn sort_by_recent_check_in(participants: &mut [Participant]) {
    participants.sort_by(|a, b| {
        let recency = match (a.latest_check_in(), b.latest_check_in()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        recency.then(a.load_order.cmp(&b.load_order))
    });
}
