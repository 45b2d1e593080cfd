use crate::error::StoreError;
use crate::models::snapshot::{AuditRecord, RankingSnapshot, SnapshotSummary};
use crate::models::vote::{Team, Vote};
use crate::sources::{
    summarize_snapshot, AuditLog, EventDirectory, JudgeRoster, SnapshotStore, StoreResult,
    SubmissionTimeline, VoteSource,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const DB_SCHEMA_VERSION: i64 = 2;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        // Future schema; do not fail reads/writes for forward-compatible changes.
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS hackathons (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY,
            hackathon_id INTEGER NOT NULL REFERENCES hackathons(id),
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS hackathon_judges (
            hackathon_id INTEGER NOT NULL REFERENCES hackathons(id),
            judge_id INTEGER NOT NULL,
            PRIMARY KEY (hackathon_id, judge_id)
        );

        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hackathon_id INTEGER NOT NULL REFERENCES hackathons(id),
            team_id INTEGER NOT NULL REFERENCES teams(id),
            judge_id INTEGER NOT NULL,
            score INTEGER NOT NULL CHECK(score BETWEEN 0 AND 10),
            voted_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hackathon_id INTEGER NOT NULL REFERENCES hackathons(id),
            team_id INTEGER NOT NULL REFERENCES teams(id),
            submitted_at INTEGER NOT NULL,
            qualifying INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS ranking_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hackathon_id INTEGER NOT NULL REFERENCES hackathons(id),
            version INTEGER NOT NULL CHECK(version >= 1),
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (hackathon_id, version)
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id TEXT PRIMARY KEY,
            actor_id TEXT NOT NULL,
            action TEXT NOT NULL,
            hackathon_id INTEGER NOT NULL,
            version INTEGER,
            details TEXT NOT NULL DEFAULT '{}',
            recorded_at INTEGER NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_teams_hackathon ON teams(hackathon_id);
        CREATE INDEX IF NOT EXISTS idx_votes_hackathon ON votes(hackathon_id);
        CREATE INDEX IF NOT EXISTS idx_submissions_team ON submissions(team_id, hackathon_id);
        CREATE INDEX IF NOT EXISTS idx_audit_log_hackathon ON audit_log(hackathon_id, recorded_at);

        CREATE TRIGGER IF NOT EXISTS ranking_snapshots_no_update
        BEFORE UPDATE ON ranking_snapshots
        BEGIN
            SELECT RAISE(ABORT, 'ranking snapshots are immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS ranking_snapshots_no_delete
        BEFORE DELETE ON ranking_snapshots
        BEGIN
            SELECT RAISE(ABORT, 'ranking snapshots are immutable');
        END;
        ",
    )
}

pub fn get_db_connection(data_dir: &str) -> Result<Connection> {
    let db_path = Path::new(data_dir).join(".rankboard").join("state.db");
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// SQLite-backed implementation of every collaborator contract.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(data_dir: &str) -> StoreResult<Self> {
        std::fs::create_dir_all(Path::new(data_dir).join(".rankboard"))
            .map_err(|e| StoreError::Storage(format!("Failed to create .rankboard directory: {e}")))?;
        Ok(Self::from_connection(get_db_connection(data_dir)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Storage("Connection lock error".to_string()))
    }

    pub fn add_hackathon(&self, hackathon_id: i64, name: &str) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO hackathons (id, name) VALUES (?1, ?2)",
            params![hackathon_id, name],
        )?;
        Ok(())
    }

    pub fn add_team(&self, hackathon_id: i64, team_id: i64, name: &str) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO teams (id, hackathon_id, name) VALUES (?1, ?2, ?3)",
            params![team_id, hackathon_id, name],
        )?;
        Ok(())
    }

    pub fn add_judge(&self, hackathon_id: i64, judge_id: i64) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO hackathon_judges (hackathon_id, judge_id) VALUES (?1, ?2)",
            params![hackathon_id, judge_id],
        )?;
        Ok(())
    }

    pub fn add_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO votes (hackathon_id, team_id, judge_id, score, voted_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                vote.hackathon_id,
                vote.team_id,
                vote.judge_id,
                vote.score,
                vote.timestamp.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    pub fn add_submission(
        &self,
        hackathon_id: i64,
        team_id: i64,
        submitted_at: DateTime<Utc>,
        qualifying: bool,
    ) -> StoreResult<()> {
        self.conn()?.execute(
            "INSERT INTO submissions (hackathon_id, team_id, submitted_at, qualifying) VALUES (?1, ?2, ?3, ?4)",
            params![hackathon_id, team_id, submitted_at.timestamp_millis(), qualifying as i32],
        )?;
        Ok(())
    }
}

fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Storage(format!("Timestamp out of range: {millis}")))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

impl EventDirectory for SqliteStore {
    fn hackathon_exists(&self, hackathon_id: i64) -> StoreResult<bool> {
        let exists = self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM hackathons WHERE id = ?1)",
            params![hackathon_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_teams(&self, hackathon_id: i64) -> StoreResult<Vec<Team>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, hackathon_id, name FROM teams WHERE hackathon_id = ?1 ORDER BY id")?;
        let teams = stmt
            .query_map(params![hackathon_id], |row| {
                Ok(Team {
                    id: row.get(0)?,
                    hackathon_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(teams)
    }
}

impl VoteSource for SqliteStore {
    fn list_votes(&self, hackathon_id: i64) -> StoreResult<Vec<Vote>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT judge_id, team_id, hackathon_id, score, voted_at FROM votes WHERE hackathon_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![hackathon_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(judge_id, team_id, hackathon_id, score, voted_at)| -> StoreResult<Vote> {
                Ok(Vote {
                    judge_id,
                    team_id,
                    hackathon_id,
                    score,
                    timestamp: from_millis(voted_at)?,
                })
            })
            .collect()
    }
}

impl JudgeRoster for SqliteStore {
    fn count_judges(&self, hackathon_id: i64) -> StoreResult<u32> {
        let count = self.conn()?.query_row(
            "SELECT COUNT(*) FROM hackathon_judges WHERE hackathon_id = ?1",
            params![hackathon_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl SubmissionTimeline for SqliteStore {
    fn earliest_submission(&self, team_id: i64, hackathon_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        let earliest: Option<i64> = self.conn()?.query_row(
            "SELECT MIN(submitted_at) FROM submissions WHERE team_id = ?1 AND hackathon_id = ?2 AND qualifying = 1",
            params![team_id, hackathon_id],
            |row| row.get(0),
        )?;
        earliest.map(from_millis).transpose()
    }
}

impl SnapshotStore for SqliteStore {
    fn current_max_version(&self, hackathon_id: i64) -> StoreResult<i64> {
        let version = self.conn()?.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM ranking_snapshots WHERE hackathon_id = ?1",
            params![hackathon_id],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    fn insert_snapshot(
        &self,
        hackathon_id: i64,
        version: i64,
        payload: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let conn = self.conn()?;
        match conn.execute(
            "INSERT INTO ranking_snapshots (hackathon_id, version, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![hackathon_id, version, payload, created_at.timestamp_millis()],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::VersionConflict {
                hackathon_id,
                version,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn list_snapshots(&self, hackathon_id: i64, limit: usize) -> StoreResult<Vec<SnapshotSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, hackathon_id, version, payload, created_at FROM ranking_snapshots WHERE hackathon_id = ?1 ORDER BY version DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![hackathon_id, limit as i64], snapshot_row)?
            .collect::<Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| summarize_snapshot(&row.into_snapshot()?))
            .collect()
    }

    fn get_snapshot(&self, hackathon_id: i64, version: i64) -> StoreResult<Option<RankingSnapshot>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, hackathon_id, version, payload, created_at FROM ranking_snapshots WHERE hackathon_id = ?1 AND version = ?2",
                params![hackathon_id, version],
                snapshot_row,
            )
            .optional()?;
        row.map(SnapshotRow::into_snapshot).transpose()
    }
}

struct SnapshotRow {
    id: i64,
    hackathon_id: i64,
    version: i64,
    payload: String,
    created_at: i64,
}

impl SnapshotRow {
    fn into_snapshot(self) -> StoreResult<RankingSnapshot> {
        Ok(RankingSnapshot {
            id: self.id,
            hackathon_id: self.hackathon_id,
            version: self.version,
            payload: self.payload,
            created_at: from_millis(self.created_at)?,
        })
    }
}

fn snapshot_row(row: &rusqlite::Row<'_>) -> Result<SnapshotRow> {
    Ok(SnapshotRow {
        id: row.get(0)?,
        hackathon_id: row.get(1)?,
        version: row.get(2)?,
        payload: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl AuditLog for SqliteStore {
    fn record(&self, record: &AuditRecord) -> StoreResult<()> {
        let details = serde_json::json!({ "motivation": record.motivation }).to_string();
        self.conn()?.execute(
            "INSERT INTO audit_log (id, actor_id, action, hackathon_id, version, details, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.actor_id,
                record.action,
                record.hackathon_id,
                record.version,
                details,
                record.recorded_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().expect("in-memory db");
        store.add_hackathon(1, "Spring Jam").expect("hackathon");
        store.add_team(1, 10, "Borrow Checkers").expect("team");
        store
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn duplicate_snapshot_version_reports_conflict() {
        let store = seeded_store();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let id = store.insert_snapshot(1, 1, "{}", now).expect("first insert");
        assert!(id > 0);

        let err = store.insert_snapshot(1, 1, "{}", now).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { hackathon_id: 1, version: 1 }));
        assert_eq!(store.current_max_version(1).expect("max version"), 1);
    }

    #[test]
    fn snapshots_cannot_be_updated_or_deleted() {
        let store = seeded_store();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store.insert_snapshot(1, 1, "{}", now).expect("insert");

        let conn = store.conn().expect("conn");
        let update = conn.execute("UPDATE ranking_snapshots SET payload = 'tampered'", []);
        let delete = conn.execute("DELETE FROM ranking_snapshots", []);
        assert!(update.is_err());
        assert!(delete.is_err());
    }

    #[test]
    fn earliest_submission_ignores_non_qualifying_entries() {
        let store = seeded_store();
        let draft = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let final_cut = Utc.with_ymd_and_hms(2026, 3, 1, 15, 30, 0).unwrap();
        store.add_submission(1, 10, draft, false).expect("draft");
        store.add_submission(1, 10, final_cut, true).expect("final");

        assert_eq!(store.earliest_submission(10, 1).expect("lookup"), Some(final_cut));
        assert_eq!(store.earliest_submission(11, 1).expect("lookup"), None);
    }

    #[test]
    fn votes_and_judges_round_trip() {
        let store = seeded_store();
        store.add_judge(1, 100).expect("judge");
        store.add_judge(1, 101).expect("judge");
        store.add_judge(1, 101).expect("duplicate judge ignored");

        let vote = Vote {
            judge_id: 100,
            team_id: 10,
            hackathon_id: 1,
            score: 7,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
        };
        store.add_vote(&vote).expect("vote");

        assert_eq!(store.count_judges(1).expect("judges"), 2);
        assert_eq!(store.list_votes(1).expect("votes"), vec![vote]);
        assert!(store.list_votes(2).expect("votes").is_empty());
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let store = seeded_store();
        let vote = Vote {
            judge_id: 100,
            team_id: 10,
            hackathon_id: 1,
            score: 11,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
        };
        assert!(store.add_vote(&vote).is_err());
    }

    #[test]
    fn unreadable_payload_fails_listing() {
        let store = seeded_store();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        store.insert_snapshot(1, 1, "not json", now).expect("insert");

        assert!(store.list_snapshots(1, 10).is_err());
        let raw = store.get_snapshot(1, 1).expect("get").expect("exists");
        assert_eq!(raw.payload, "not json");
        assert_eq!(raw.created_at, now);
    }
}
