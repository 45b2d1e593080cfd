use super::{
    summarize_snapshot, AuditLog, EventDirectory, JudgeRoster, SnapshotStore, StoreResult,
    SubmissionTimeline, VoteSource,
};
use crate::error::StoreError;
use crate::models::snapshot::{AuditRecord, RankingSnapshot, SnapshotSummary};
use crate::models::vote::{Team, Vote};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    hackathons: BTreeSet<i64>,
    teams: Vec<Team>,
    votes: Vec<Vote>,
    judge_counts: HashMap<i64, u32>,
    submissions: HashMap<(i64, i64), DateTime<Utc>>,
    snapshots: BTreeMap<(i64, i64), RankingSnapshot>,
    audit: Vec<AuditRecord>,
    last_snapshot_id: i64,
    insert_calls: usize,
}

/// Process-local implementation of every collaborator contract. The snapshot
/// map is keyed by `(hackathon_id, version)` and checked under the lock, so it
/// enforces the same uniqueness the SQLite store does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hackathon(&self, hackathon_id: i64, judge_count: u32) {
        let mut state = self.fixture_state();
        state.hackathons.insert(hackathon_id);
        state.judge_counts.insert(hackathon_id, judge_count);
    }

    pub fn add_team(&self, hackathon_id: i64, team_id: i64, name: &str) {
        self.fixture_state().teams.push(Team {
            id: team_id,
            hackathon_id,
            name: name.to_string(),
        });
    }

    pub fn add_vote(&self, vote: Vote) {
        self.fixture_state().votes.push(vote);
    }

    /// Keeps the earliest timestamp seen per team.
    pub fn add_submission(&self, hackathon_id: i64, team_id: i64, submitted_at: DateTime<Utc>) {
        self.fixture_state()
            .submissions
            .entry((team_id, hackathon_id))
            .and_modify(|ts| *ts = (*ts).min(submitted_at))
            .or_insert(submitted_at);
    }

    pub fn snapshots(&self, hackathon_id: i64) -> Vec<RankingSnapshot> {
        self.fixture_state()
            .snapshots
            .values()
            .filter(|s| s.hackathon_id == hackathon_id)
            .cloned()
            .collect()
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.fixture_state().audit.clone()
    }

    /// Number of `insert_snapshot` calls, including rejected ones.
    pub fn insert_calls(&self) -> usize {
        self.fixture_state().insert_calls
    }

    // Seeding and inspection helpers only; they outlive a panicked test
    // thread. Collaborator calls go through `lock` and report poisoning.
    fn fixture_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Storage("memory store lock poisoned".to_string()))
    }
}

impl EventDirectory for MemoryStore {
    fn hackathon_exists(&self, hackathon_id: i64) -> StoreResult<bool> {
        Ok(self.lock()?.hackathons.contains(&hackathon_id))
    }

    fn list_teams(&self, hackathon_id: i64) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .lock()?
            .teams
            .iter()
            .filter(|t| t.hackathon_id == hackathon_id)
            .cloned()
            .collect();
        teams.sort_by_key(|t| t.id);
        Ok(teams)
    }
}

impl VoteSource for MemoryStore {
    fn list_votes(&self, hackathon_id: i64) -> StoreResult<Vec<Vote>> {
        Ok(self
            .lock()?
            .votes
            .iter()
            .filter(|v| v.hackathon_id == hackathon_id)
            .cloned()
            .collect())
    }
}

impl JudgeRoster for MemoryStore {
    fn count_judges(&self, hackathon_id: i64) -> StoreResult<u32> {
        Ok(self.lock()?.judge_counts.get(&hackathon_id).copied().unwrap_or(0))
    }
}

impl SubmissionTimeline for MemoryStore {
    fn earliest_submission(&self, team_id: i64, hackathon_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.lock()?.submissions.get(&(team_id, hackathon_id)).copied())
    }
}

impl SnapshotStore for MemoryStore {
    fn current_max_version(&self, hackathon_id: i64) -> StoreResult<i64> {
        Ok(self
            .lock()?
            .snapshots
            .range((hackathon_id, i64::MIN)..=(hackathon_id, i64::MAX))
            .next_back()
            .map(|((_, version), _)| *version)
            .unwrap_or(0))
    }

    fn insert_snapshot(
        &self,
        hackathon_id: i64,
        version: i64,
        payload: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut state = self.lock()?;
        state.insert_calls += 1;

        if state.snapshots.contains_key(&(hackathon_id, version)) {
            return Err(StoreError::VersionConflict {
                hackathon_id,
                version,
            });
        }

        state.last_snapshot_id += 1;
        let id = state.last_snapshot_id;
        state.snapshots.insert(
            (hackathon_id, version),
            RankingSnapshot {
                id,
                hackathon_id,
                version,
                payload: payload.to_string(),
                created_at,
            },
        );
        Ok(id)
    }

    fn list_snapshots(&self, hackathon_id: i64, limit: usize) -> StoreResult<Vec<SnapshotSummary>> {
        self.lock()?
            .snapshots
            .range((hackathon_id, i64::MIN)..=(hackathon_id, i64::MAX))
            .rev()
            .take(limit)
            .map(|(_, snapshot)| summarize_snapshot(snapshot))
            .collect()
    }

    fn get_snapshot(&self, hackathon_id: i64, version: i64) -> StoreResult<Option<RankingSnapshot>> {
        Ok(self.lock()?.snapshots.get(&(hackathon_id, version)).cloned())
    }
}

impl AuditLog for MemoryStore {
    fn record(&self, record: &AuditRecord) -> StoreResult<()> {
        self.lock()?.audit.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_duplicate_versions() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        store.insert_snapshot(1, 1, "{}", now).expect("first insert");
        let err = store.insert_snapshot(1, 1, "{}", now).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { hackathon_id: 1, version: 1 }));
        assert_eq!(store.insert_calls(), 2);
    }

    #[test]
    fn max_version_is_scoped_per_hackathon() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        store.insert_snapshot(1, 1, "{}", now).unwrap();
        store.insert_snapshot(1, 2, "{}", now).unwrap();
        store.insert_snapshot(2, 1, "{}", now).unwrap();

        assert_eq!(store.current_max_version(1).unwrap(), 2);
        assert_eq!(store.current_max_version(2).unwrap(), 1);
        assert_eq!(store.current_max_version(3).unwrap(), 0);
    }

    #[test]
    fn poisoned_lock_fails_collaborator_calls_only() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.add_hackathon(1, 2);

        let poisoner = store.clone();
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(joined.is_err());

        let err = store.hackathon_exists(1).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)), "{err:?}");
        assert!(store.insert_snapshot(1, 1, "{}", Utc::now()).is_err());

        store.add_team(1, 10, "Still seeding");
        assert!(store.snapshots(1).is_empty());
    }

    #[test]
    fn keeps_earliest_submission() {
        let store = MemoryStore::new();
        let early = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 2, 1, 17, 0, 0).unwrap();

        store.add_submission(1, 10, late);
        store.add_submission(1, 10, early);
        assert_eq!(store.earliest_submission(10, 1).unwrap(), Some(early));
        assert_eq!(store.earliest_submission(10, 2).unwrap(), None);
    }
}
