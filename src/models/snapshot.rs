use super::ranking::TeamAggregate;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSnapshot {
    pub id: i64,
    pub hackathon_id: i64,
    pub version: i64,
    pub payload: String, // JSON document, see SnapshotPayload
    pub created_at: DateTime<Utc>,
}

impl RankingSnapshot {
    pub fn decode_payload(&self) -> Result<SnapshotPayload, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: i64,
    pub hackathon_id: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub missing_votes: bool,
    pub motivation: Option<String>,
    pub entry_count: usize,
}

/// Persisted ranking document. Field declaration order is the serialized order
/// and must not change: downstream tooling hashes and diffs these payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub hackathon_id: i64,
    pub version: i64,
    pub generated_at: String,
    pub missing_votes: bool,
    pub motivation: Option<String>,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub position: usize,
    pub team_id: i64,
    pub team_name: String,
    pub average: f64,
    pub dispersion: f64,
    pub votes: usize,
    pub earliest_submission: Option<String>,
    pub missing_votes: bool,
}

impl SnapshotPayload {
    pub fn build(
        hackathon_id: i64,
        version: i64,
        generated_at: DateTime<Utc>,
        precision: TimestampPrecision,
        missing_votes: bool,
        motivation: Option<String>,
        entries: &[TeamAggregate],
    ) -> Self {
        SnapshotPayload {
            hackathon_id,
            version,
            generated_at: format_timestamp(&generated_at, precision),
            missing_votes,
            motivation,
            entries: entries
                .iter()
                .map(|entry| SnapshotEntry {
                    position: entry.position,
                    team_id: entry.team_id,
                    team_name: entry.team_name.clone(),
                    average: entry.average,
                    dispersion: entry.dispersion,
                    votes: entry.vote_count,
                    earliest_submission: entry
                        .earliest_submission
                        .as_ref()
                        .map(|ts| format_timestamp(ts, precision)),
                    missing_votes: entry.missing_votes,
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPrecision {
    Seconds,
    #[default]
    Millis,
}

impl TimestampPrecision {
    pub fn from_setting(value: &str) -> Self {
        match value {
            "seconds" => TimestampPrecision::Seconds,
            _ => TimestampPrecision::Millis,
        }
    }

    /// Drop the sub-second digits this precision does not render, so a stored
    /// timestamp and its formatted form name the same instant.
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimestampPrecision::Seconds => ts.trunc_subsecs(0),
            TimestampPrecision::Millis => ts.trunc_subsecs(3),
        }
    }
}

/// RFC 3339, UTC, `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>, precision: TimestampPrecision) -> String {
    let format = match precision {
        TimestampPrecision::Seconds => SecondsFormat::Secs,
        TimestampPrecision::Millis => SecondsFormat::Millis,
    };
    ts.to_rfc3339_opts(format, true)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub actor_id: String,
    pub action: String,
    pub hackathon_id: i64,
    pub version: i64,
    pub motivation: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionChange {
    pub team_id: i64,
    pub team_name: String,
    pub previous_position: Option<usize>,
    pub current_position: Option<usize>,
    /// Positive when the team climbed. `None` unless present in both versions.
    pub delta: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn aggregate(position: usize, team_id: i64, name: &str) -> TeamAggregate {
        TeamAggregate {
            team_id,
            team_name: name.to_string(),
            average: 8.5,
            dispersion: 0.5,
            vote_count: 2,
            earliest_submission: Some(Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()),
            missing_votes: false,
            position,
        }
    }

    #[test]
    fn payload_serializes_fields_in_contract_order() {
        let generated_at = Utc.with_ymd_and_hms(2026, 3, 15, 18, 0, 0).unwrap();
        let payload = SnapshotPayload::build(
            7,
            3,
            generated_at,
            TimestampPrecision::Millis,
            false,
            None,
            &[aggregate(1, 42, "Rustaceans")],
        );

        let json = payload.to_json().expect("serialize payload");
        assert_eq!(
            json,
            "{\"hackathonId\":7,\"version\":3,\"generatedAt\":\"2026-03-15T18:00:00.000Z\",\
             \"missingVotes\":false,\"motivation\":null,\"entries\":[{\"position\":1,\"teamId\":42,\
             \"teamName\":\"Rustaceans\",\"average\":8.5,\"dispersion\":0.5,\"votes\":2,\
             \"earliestSubmission\":\"2026-03-14T09:30:00.000Z\",\"missingVotes\":false}]}"
        );
    }

    #[test]
    fn truncation_matches_rendered_precision() {
        let whole = Utc.with_ymd_and_hms(2026, 5, 28, 20, 26, 40).unwrap();
        let ts = whole + chrono::Duration::microseconds(750_250);

        let secs = TimestampPrecision::Seconds.truncate(ts);
        assert_eq!(secs, whole);
        assert_eq!(format_timestamp(&secs, TimestampPrecision::Seconds), "2026-05-28T20:26:40Z");

        let millis = TimestampPrecision::Millis.truncate(ts);
        assert_eq!(millis, whole + chrono::Duration::milliseconds(750));
        assert_eq!(format_timestamp(&millis, TimestampPrecision::Millis), "2026-05-28T20:26:40.750Z");
    }

    #[test]
    fn sentinel_dispersion_survives_decode() {
        let mut unvoted = aggregate(1, 5, "Ghosts");
        unvoted.dispersion = crate::analysis::dispersion::DISPERSION_SENTINEL;
        unvoted.earliest_submission = None;

        let payload = SnapshotPayload::build(
            1,
            1,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            TimestampPrecision::Seconds,
            true,
            Some("late judges".to_string()),
            &[unvoted],
        );
        let snapshot = RankingSnapshot {
            id: 1,
            hackathon_id: 1,
            version: 1,
            payload: payload.to_json().expect("serialize payload"),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };

        let decoded = snapshot.decode_payload().expect("decode payload");
        assert_eq!(decoded, payload);
        assert_eq!(decoded.generated_at, "2026-01-01T00:00:00Z");
        assert_eq!(decoded.entries[0].earliest_submission, None);
    }

    #[test]
    fn failed_publish_result_omits_success_fields() {
        let result = PublishResult {
            success: false,
            error_code: Some("MISSING_VOTES".to_string()),
            message: Some("incomplete".to_string()),
            ..PublishResult::default()
        };
        let value = serde_json::to_value(&result).expect("serialize result");
        assert_eq!(
            value,
            serde_json::json!({"success": false, "errorCode": "MISSING_VOTES", "message": "incomplete"})
        );
    }
}
