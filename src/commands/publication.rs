use crate::analysis::movement::position_changes;
use crate::analysis::ranking::compute_ranking;
use crate::commands::settings::EffectiveRankingSettings;
use crate::error::{RankingError, StoreError};
use crate::models::ranking::Preview;
use crate::models::snapshot::{
    AuditRecord, PositionChange, RankingSnapshot, SnapshotPayload, SnapshotSummary,
};
use crate::sources::{
    AuditLog, EventDirectory, JudgeRoster, SnapshotStore, SubmissionTimeline, VoteSource,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const PUBLISH_ACTION: &str = "ranking.publish";

/// The collaborators a publication service reads from and writes to.
#[derive(Clone)]
pub struct RankingSources {
    pub events: Arc<dyn EventDirectory>,
    pub votes: Arc<dyn VoteSource>,
    pub roster: Arc<dyn JudgeRoster>,
    pub timeline: Arc<dyn SubmissionTimeline>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub audit: Arc<dyn AuditLog>,
}

impl RankingSources {
    /// Use one store for every collaborator.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: EventDirectory
            + VoteSource
            + JudgeRoster
            + SubmissionTimeline
            + SnapshotStore
            + AuditLog
            + 'static,
    {
        RankingSources {
            events: store.clone(),
            votes: store.clone(),
            roster: store.clone(),
            timeline: store.clone(),
            snapshots: store.clone(),
            audit: store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    pub snapshot_id: i64,
    pub version: i64,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct RankingPublicationService {
    sources: RankingSources,
    settings: EffectiveRankingSettings,
    clock: Clock,
}

impl RankingPublicationService {
    pub fn new(sources: RankingSources, settings: EffectiveRankingSettings) -> Self {
        RankingPublicationService {
            sources,
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Compute the current ranking. Never writes and never fails on missing
    /// votes; `allow_missing_votes` only decides `publish_blocked`.
    pub fn preview(&self, hackathon_id: i64, allow_missing_votes: bool) -> Result<Preview, RankingError> {
        self.ensure_hackathon(hackathon_id)?;

        let teams = self.sources.events.list_teams(hackathon_id)?;
        let votes = self.sources.votes.list_votes(hackathon_id)?;
        let expected_judges = self.sources.roster.count_judges(hackathon_id)?;

        let outcome = compute_ranking(hackathon_id, &teams, &votes, expected_judges, |team_id| {
            self.sources.timeline.earliest_submission(team_id, hackathon_id)
        })?;

        Ok(Preview {
            publish_blocked: outcome.missing_votes_overall && !allow_missing_votes,
            missing_votes_overall: outcome.missing_votes_overall,
            entries: outcome.entries,
        })
    }

    /// Publish a new snapshot version.
    ///
    /// Every successful call appends a version, even when the ranking did not
    /// change since the last one. The version is taken as `max + 1` and the
    /// store's `(hackathon, version)` uniqueness decides races: on a conflict
    /// the max is re-read and the insert retried, up to `publish_max_attempts`.
    pub fn publish(
        &self,
        hackathon_id: i64,
        allow_missing_votes: bool,
        actor_id: &str,
        motivation: Option<&str>,
    ) -> Result<Published, RankingError> {
        let actor_id = actor_id.trim();
        if actor_id.is_empty() {
            return Err(RankingError::Validation("Actor id is required to publish".to_string()));
        }

        let preview = self.preview(hackathon_id, allow_missing_votes)?;
        if preview.publish_blocked {
            let incomplete = preview.entries.iter().filter(|e| e.missing_votes).count();
            log::info!(
                "hackathon {hackathon_id}: publish by {actor_id} blocked, {incomplete} teams missing votes"
            );
            return Err(RankingError::MissingVotes(format!(
                "{incomplete} of {} teams have fewer votes than expected judges",
                preview.entries.len()
            )));
        }

        let motivation = motivation
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let attempts = self.settings.publish_max_attempts.max(1);
        for attempt in 1..=attempts {
            let version = self.sources.snapshots.current_max_version(hackathon_id)? + 1;
            let created_at = self.settings.timestamp_precision.truncate((self.clock)());
            let payload = SnapshotPayload::build(
                hackathon_id,
                version,
                created_at,
                self.settings.timestamp_precision,
                preview.missing_votes_overall,
                motivation.clone(),
                &preview.entries,
            )
            .to_json()
            .map_err(|e| RankingError::Internal(format!("Failed to serialize snapshot payload: {e}")))?;

            match self
                .sources
                .snapshots
                .insert_snapshot(hackathon_id, version, &payload, created_at)
            {
                Ok(snapshot_id) => {
                    log::info!(
                        "hackathon {hackathon_id}: published ranking v{version} (snapshot {snapshot_id}) by {actor_id}"
                    );
                    self.record_publication(actor_id, hackathon_id, version, motivation, created_at);
                    return Ok(Published {
                        snapshot_id,
                        version,
                    });
                }
                Err(StoreError::VersionConflict { .. }) => {
                    log::warn!(
                        "hackathon {hackathon_id}: version {version} taken concurrently (attempt {attempt}/{attempts})"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RankingError::Internal(format!(
            "Could not allocate a snapshot version for hackathon {hackathon_id} after {attempts} attempts"
        )))
    }

    pub fn list_snapshots(&self, hackathon_id: i64) -> Result<Vec<SnapshotSummary>, RankingError> {
        self.ensure_hackathon(hackathon_id)?;
        Ok(self
            .sources
            .snapshots
            .list_snapshots(hackathon_id, self.settings.snapshot_history_limit)?)
    }

    pub fn get_snapshot(&self, hackathon_id: i64, version: i64) -> Result<Option<RankingSnapshot>, RankingError> {
        self.ensure_hackathon(hackathon_id)?;
        Ok(self.sources.snapshots.get_snapshot(hackathon_id, version)?)
    }

    /// Decode a stored snapshot back into its ranking document.
    pub fn replay_snapshot(&self, hackathon_id: i64, version: i64) -> Result<SnapshotPayload, RankingError> {
        let snapshot = self.get_snapshot(hackathon_id, version)?.ok_or_else(|| {
            RankingError::Validation(format!(
                "Hackathon {hackathon_id} has no ranking snapshot version {version}"
            ))
        })?;

        snapshot.decode_payload().map_err(|e| {
            RankingError::Internal(format!("Snapshot v{version} payload is unreadable: {e}"))
        })
    }

    pub fn compare_snapshots(
        &self,
        hackathon_id: i64,
        from_version: i64,
        to_version: i64,
    ) -> Result<Vec<PositionChange>, RankingError> {
        let previous = self.replay_snapshot(hackathon_id, from_version)?;
        let current = self.replay_snapshot(hackathon_id, to_version)?;
        Ok(position_changes(&previous, &current))
    }

    fn ensure_hackathon(&self, hackathon_id: i64) -> Result<(), RankingError> {
        if hackathon_id <= 0 {
            return Err(RankingError::Validation(format!(
                "Hackathon id must be positive, got {hackathon_id}"
            )));
        }
        if !self.sources.events.hackathon_exists(hackathon_id)? {
            return Err(RankingError::Validation(format!("Unknown hackathon: {hackathon_id}")));
        }
        Ok(())
    }

    // The snapshot is already visible at this point, so an audit failure is
    // reported in the log rather than to the caller.
    fn record_publication(
        &self,
        actor_id: &str,
        hackathon_id: i64,
        version: i64,
        motivation: Option<String>,
        recorded_at: DateTime<Utc>,
    ) {
        let record = AuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            actor_id: actor_id.to_string(),
            action: PUBLISH_ACTION.to_string(),
            hackathon_id,
            version,
            motivation,
            recorded_at,
        };

        if let Err(e) = self.sources.audit.record(&record) {
            log::warn!("hackathon {hackathon_id}: audit record for v{version} not written: {e}");
        }
    }
}
