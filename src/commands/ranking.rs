use crate::commands::db::SqliteStore;
use crate::commands::publication::{RankingPublicationService, RankingSources};
use crate::commands::settings::load_effective_settings;
use crate::error::RankingError;
use crate::models::ranking::Preview;
use crate::models::snapshot::{
    PositionChange, PublishResult, RankingSnapshot, SnapshotPayload, SnapshotSummary,
};
use std::sync::Arc;

/// Shared handle the command functions run against.
#[derive(Clone)]
pub struct RankingState {
    service: Arc<RankingPublicationService>,
}

impl RankingState {
    pub fn new(service: RankingPublicationService) -> Self {
        RankingState {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> &RankingPublicationService {
        &self.service
    }
}

/// Load settings, install logging and open the SQLite store under `data_dir`.
pub fn open_ranking_state(data_dir: &str) -> Result<(RankingState, Arc<SqliteStore>), String> {
    let settings = load_effective_settings(data_dir)?;
    crate::init_logging(settings.log_level);

    let store = Arc::new(SqliteStore::open(data_dir).map_err(|e| format!("DB error: {e}"))?);
    let service = RankingPublicationService::new(RankingSources::from_store(store.clone()), settings);
    log::debug!("ranking state opened at {data_dir}");

    Ok((RankingState::new(service), store))
}

pub async fn preview_ranking(
    state: &RankingState,
    hackathon_id: i64,
    allow_missing_votes: bool,
) -> Result<Preview, String> {
    run_blocking(state, move |service| service.preview(hackathon_id, allow_missing_votes))
        .await
        .map_err(|e| e.to_string())
}

pub async fn publish_ranking(
    state: &RankingState,
    hackathon_id: i64,
    allow_missing_votes: bool,
    actor_id: String,
    motivation: Option<String>,
) -> PublishResult {
    let outcome = run_blocking(state, move |service| {
        service.publish(hackathon_id, allow_missing_votes, &actor_id, motivation.as_deref())
    })
    .await;

    match outcome {
        Ok(published) => PublishResult {
            success: true,
            snapshot_id: Some(published.snapshot_id),
            version: Some(published.version),
            ..PublishResult::default()
        },
        Err(e) => PublishResult {
            success: false,
            error_code: Some(e.code().to_string()),
            message: Some(e.message().to_string()),
            ..PublishResult::default()
        },
    }
}

pub async fn list_ranking_snapshots(
    state: &RankingState,
    hackathon_id: i64,
) -> Result<Vec<SnapshotSummary>, String> {
    run_blocking(state, move |service| service.list_snapshots(hackathon_id))
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_ranking_snapshot(
    state: &RankingState,
    hackathon_id: i64,
    version: i64,
) -> Result<Option<RankingSnapshot>, String> {
    run_blocking(state, move |service| service.get_snapshot(hackathon_id, version))
        .await
        .map_err(|e| e.to_string())
}

pub async fn replay_ranking_snapshot(
    state: &RankingState,
    hackathon_id: i64,
    version: i64,
) -> Result<SnapshotPayload, String> {
    run_blocking(state, move |service| service.replay_snapshot(hackathon_id, version))
        .await
        .map_err(|e| e.to_string())
}

pub async fn compare_ranking_snapshots(
    state: &RankingState,
    hackathon_id: i64,
    from_version: i64,
    to_version: i64,
) -> Result<Vec<PositionChange>, String> {
    run_blocking(state, move |service| {
        service.compare_snapshots(hackathon_id, from_version, to_version)
    })
    .await
    .map_err(|e| e.to_string())
}

// SQLite calls block, so the service runs on tokio's blocking pool.
async fn run_blocking<T, F>(state: &RankingState, task: F) -> Result<T, RankingError>
where
    T: Send + 'static,
    F: FnOnce(&RankingPublicationService) -> Result<T, RankingError> + Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || task(&*service))
        .await
        .map_err(|e| RankingError::Internal(format!("Ranking task failed: {e}")))?
}
