//! Participant model and roster upload rows.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::Mode;

/// One recorded check-in with the mode it was recorded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInEntry {
    pub at: DateTime<Utc>,
    pub mode: Mode,
}

impl CheckInEntry {
    /// Calendar date of this check-in in the event's local time.
    pub fn local_date(&self, offset: &FixedOffset) -> NaiveDate {
        self.at.with_timezone(offset).date_naive()
    }
}

/// A roster entry and its attendance history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub english_name: String,
    pub voice_part: String,
    pub is_valid: bool,
    /// Arrival order, serialized as bare timestamps
    #[serde(serialize_with = "serialize_timestamps")]
    pub check_ins: Vec<CheckInEntry>,
    /// Internal version for optimistic concurrency control
    #[serde(skip)]
    pub version: i64,
    /// Roster generation this row was loaded under
    #[serde(skip)]
    pub generation: i64,
    /// Position in the uploaded roster
    #[serde(skip)]
    pub load_order: i64,
}

impl Participant {
    /// Latest check-in by timestamp, regardless of arrival order.
    pub fn latest_check_in(&self) -> Option<DateTime<Utc>> {
        self.check_ins.iter().map(|entry| entry.at).max()
    }

    /// Whether any recorded check-in falls on `date` in event local time.
    pub fn checked_in_on(&self, date: NaiveDate, offset: &FixedOffset) -> bool {
        self.check_ins
            .iter()
            .any(|entry| entry.local_date(offset) == date)
    }
}

#[allow(clippy::ptr_arg)]
fn serialize_timestamps<S>(entries: &Vec<CheckInEntry>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(entries.iter().map(|entry| entry.at))
}

/// One row of an uploaded roster, already decoded from the spreadsheet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub voice_part: String,
    #[serde(default = "default_is_valid")]
    pub is_valid: bool,
    /// Previously recorded check-ins, e.g. when re-importing an export
    #[serde(default)]
    pub check_ins: Vec<String>,
}

fn default_is_valid() -> bool {
    true
}

/// Request body for replacing the roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRosterRequest {
    pub participants: Vec<RosterRow>,
    #[serde(default)]
    pub activity_name: Option<String>,
}

/// Roster size after a replace or clear.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub total_people: i64,
    pub roster_generation: i64,
    pub current_activity_name: String,
}

/// Response body for the total-people endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalPeople {
    pub total_people: i64,
}

/// Response body for the current-activity endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentActivity {
    pub current_activity_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(at: &str) -> CheckInEntry {
        CheckInEntry {
            at: at.parse().unwrap(),
            mode: Mode::Live,
        }
    }

    fn participant(check_ins: Vec<CheckInEntry>) -> Participant {
        Participant {
            id: "P1".to_string(),
            name: "陳大文".to_string(),
            english_name: "Chan Tai Man".to_string(),
            voice_part: "Tenor".to_string(),
            is_valid: true,
            check_ins,
            version: 1,
            generation: 1,
            load_order: 0,
        }
    }

    #[test]
    fn test_serializes_check_ins_as_timestamps() {
        let p = participant(vec![entry("2024-01-01T09:00:00Z")]);
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["englishName"], "Chan Tai Man");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["checkIns"], serde_json::json!(["2024-01-01T09:00:00Z"]));
        assert!(json.get("version").is_none());
        assert!(json.get("loadOrder").is_none());
    }

    #[test]
    fn test_latest_check_in_uses_timestamp_not_arrival() {
        let p = participant(vec![
            entry("2024-01-02T09:00:00Z"),
            entry("2024-01-01T09:00:00Z"),
        ]);
        assert_eq!(
            p.latest_check_in(),
            Some("2024-01-02T09:00:00Z".parse().unwrap())
        );
        assert_eq!(participant(vec![]).latest_check_in(), None);
    }

    #[test]
    fn test_checked_in_on_uses_event_local_date() {
        let hong_kong = FixedOffset::east_opt(8 * 3600).unwrap();
        // 20:00 UTC on Jan 1 is already Jan 2 in UTC+8
        let p = participant(vec![entry("2024-01-01T20:00:00Z")]);

        assert!(p.checked_in_on(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), &hong_kong));
        assert!(!p.checked_in_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &hong_kong));
    }

    #[test]
    fn test_roster_row_defaults() {
        let row: RosterRow = serde_json::from_str(r#"{"id": "A1", "name": "Amy"}"#).unwrap();
        assert_eq!(row.id.as_deref(), Some("A1"));
        assert!(row.is_valid);
        assert!(row.check_ins.is_empty());
        assert_eq!(row.voice_part, "");
    }
}
