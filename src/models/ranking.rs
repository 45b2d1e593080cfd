use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Computed ranking record for one team. Built once per computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAggregate {
    pub team_id: i64,
    pub team_name: String,
    pub average: f64,
    pub dispersion: f64,
    pub vote_count: usize,
    pub earliest_submission: Option<DateTime<Utc>>,
    pub missing_votes: bool,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub entries: Vec<TeamAggregate>,
    pub missing_votes_overall: bool,
    /// True when a publish with the same `allow_missing_votes` flag would be refused.
    pub publish_blocked: bool,
}
