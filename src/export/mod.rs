//! Export reconciler.
//!
//! Flattens a roster snapshot into one row per check-in, with a placeholder
//! row for every participant that has none, so the roster size can always be
//! recovered from the export.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DemoExportPolicy;
use crate::coordinator::CheckInPolicy;
use crate::db::RosterSnapshot;
use crate::models::Mode;

const CSV_HEADER: [&str; 8] = [
    "id",
    "name",
    "englishName",
    "voicePart",
    "isValid",
    "checkInTime",
    "localCheckInTime",
    "mode",
];

/// Requested export encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// One flattened export row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub id: String,
    pub name: String,
    pub english_name: String,
    pub voice_part: String,
    pub is_valid: bool,
    /// `None` marks the placeholder row of a participant with no check-ins
    pub check_in_time: Option<DateTime<Utc>>,
    pub local_check_in_time: Option<String>,
    pub mode: Option<Mode>,
}

/// A complete export taken from one snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInExport {
    pub activity_name: String,
    pub roster_generation: i64,
    pub generated_at: DateTime<Utc>,
    #[serde(skip)]
    pub event_offset: FixedOffset,
    pub total_people: i64,
    pub total_check_ins: i64,
    pub rows: Vec<ExportRow>,
}

/// Build the export rows for `snapshot`.
pub fn reconcile(
    snapshot: &RosterSnapshot,
    policy: &CheckInPolicy,
    generated_at: DateTime<Utc>,
) -> CheckInExport {
    let hide_demo =
        policy.demo_export == DemoExportPolicy::ExcludeInLive && snapshot.mode == Mode::Live;
    let offset = policy.event_offset;

    let mut rows = Vec::with_capacity(snapshot.participants.len());
    let mut total_check_ins = 0;

    for participant in &snapshot.participants {
        let base = ExportRow {
            id: participant.id.clone(),
            name: participant.name.clone(),
            english_name: participant.english_name.clone(),
            voice_part: participant.voice_part.clone(),
            is_valid: participant.is_valid,
            check_in_time: None,
            local_check_in_time: None,
            mode: None,
        };

        let mut exported = 0;
        for entry in participant
            .check_ins
            .iter()
            .filter(|entry| !(hide_demo && entry.mode == Mode::Demo))
        {
            rows.push(ExportRow {
                check_in_time: Some(entry.at),
                local_check_in_time: Some(
                    entry
                        .at
                        .with_timezone(&offset)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                ),
                mode: Some(entry.mode),
                ..base.clone()
            });
            exported += 1;
        }

        if exported == 0 {
            rows.push(base);
        }
        total_check_ins += exported;
    }

    CheckInExport {
        activity_name: snapshot.activity_name.clone(),
        roster_generation: snapshot.roster_generation,
        generated_at,
        event_offset: offset,
        total_people: snapshot.participants.len() as i64,
        total_check_ins,
        rows,
    }
}

impl CheckInExport {
    /// Render as CSV with a UTF-8 byte order mark for spreadsheet tools.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("\u{feff}");
        push_record(&mut out, CSV_HEADER.iter().copied());

        for row in &self.rows {
            let check_in_time = row
                .check_in_time
                .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
                .unwrap_or_default();
            let is_valid = if row.is_valid { "true" } else { "false" };
            push_record(
                &mut out,
                [
                    row.id.as_str(),
                    row.name.as_str(),
                    row.english_name.as_str(),
                    row.voice_part.as_str(),
                    is_valid,
                    check_in_time.as_str(),
                    row.local_check_in_time.as_deref().unwrap_or_default(),
                    row.mode.map(|m| m.as_str()).unwrap_or_default(),
                ],
            );
        }
        out
    }

    /// Download name: `<activity>_checkins_<YYYY-MM-DD>_<HH-MM-SS>.csv` in event local time.
    pub fn file_name(&self) -> String {
        let activity: String = self
            .activity_name
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() || c.is_whitespace() => '_',
                c => c,
            })
            .collect();
        let activity = if activity.is_empty() {
            "Unnamed_Activity".to_string()
        } else {
            activity
        };
        let stamp = self
            .generated_at
            .with_timezone(&self.event_offset)
            .format("%Y-%m-%d_%H-%M-%S");
        format!("{activity}_checkins_{stamp}.csv")
    }
}

fn push_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987 UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
