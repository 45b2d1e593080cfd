//! Narrow contracts for the collaborators the ranking core reads from and
//! writes to. `commands::db::SqliteStore` backs them in production and
//! `memory::MemoryStore` in tests.

pub mod memory;

use crate::error::StoreError;
use crate::models::snapshot::{AuditRecord, RankingSnapshot, SnapshotSummary};
use crate::models::vote::{Team, Vote};
use chrono::{DateTime, Utc};

pub type StoreResult<T> = Result<T, StoreError>;

pub trait EventDirectory: Send + Sync {
    fn hackathon_exists(&self, hackathon_id: i64) -> StoreResult<bool>;
    fn list_teams(&self, hackathon_id: i64) -> StoreResult<Vec<Team>>;
}

pub trait VoteSource: Send + Sync {
    fn list_votes(&self, hackathon_id: i64) -> StoreResult<Vec<Vote>>;
}

pub trait JudgeRoster: Send + Sync {
    fn count_judges(&self, hackathon_id: i64) -> StoreResult<u32>;
}

pub trait SubmissionTimeline: Send + Sync {
    fn earliest_submission(&self, team_id: i64, hackathon_id: i64) -> StoreResult<Option<DateTime<Utc>>>;
}

/// Append-only store of ranking snapshots.
pub trait SnapshotStore: Send + Sync {
    /// 0 when the hackathon has no snapshot yet.
    fn current_max_version(&self, hackathon_id: i64) -> StoreResult<i64>;

    /// Single atomic write. Fails with `StoreError::VersionConflict` when
    /// `(hackathon_id, version)` already exists.
    fn insert_snapshot(
        &self,
        hackathon_id: i64,
        version: i64,
        payload: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Newest first.
    fn list_snapshots(&self, hackathon_id: i64, limit: usize) -> StoreResult<Vec<SnapshotSummary>>;

    fn get_snapshot(&self, hackathon_id: i64, version: i64) -> StoreResult<Option<RankingSnapshot>>;
}

pub trait AuditLog: Send + Sync {
    fn record(&self, record: &AuditRecord) -> StoreResult<()>;
}

/// Summarize a stored snapshot from its payload.
pub fn summarize_snapshot(snapshot: &RankingSnapshot) -> StoreResult<SnapshotSummary> {
    let payload = snapshot.decode_payload().map_err(|e| {
        StoreError::Storage(format!(
            "snapshot v{} of hackathon {} has an unreadable payload: {e}",
            snapshot.version, snapshot.hackathon_id
        ))
    })?;

    Ok(SnapshotSummary {
        id: snapshot.id,
        hackathon_id: snapshot.hackathon_id,
        version: snapshot.version,
        created_at: snapshot.created_at,
        missing_votes: payload.missing_votes,
        motivation: payload.motivation,
        entry_count: payload.entries.len(),
    })
}
