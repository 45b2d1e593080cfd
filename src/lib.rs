pub mod analysis;
pub mod commands;
pub mod error;
pub mod models;
pub mod sources;

pub use commands::publication::{Published, RankingPublicationService, RankingSources};
pub use commands::ranking::{
    compare_ranking_snapshots, get_ranking_snapshot, list_ranking_snapshots, open_ranking_state,
    preview_ranking, publish_ranking, replay_ranking_snapshot, RankingState,
};
pub use commands::settings::{get_settings, save_settings};
pub use error::{RankingError, StoreError};

/// Install the `env_logger` backend. `RUST_LOG` overrides `level`; repeated
/// calls keep the first logger.
pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
