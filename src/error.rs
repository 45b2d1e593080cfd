use thiserror::Error;

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const MISSING_VOTES: &str = "MISSING_VOTES";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Failure reported by a ranking operation. `Display` renders as `CODE: message`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RankingError {
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    #[error("MISSING_VOTES: {0}")]
    MissingVotes(String),

    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

impl RankingError {
    pub fn code(&self) -> &'static str {
        match self {
            RankingError::Validation(_) => VALIDATION_ERROR,
            RankingError::MissingVotes(_) => MISSING_VOTES,
            RankingError::Internal(_) => INTERNAL_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RankingError::Validation(msg)
            | RankingError::MissingVotes(msg)
            | RankingError::Internal(msg) => msg,
        }
    }
}

/// Failure reported by an external collaborator (vote source, snapshot store, ...).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot version {version} already exists for hackathon {hackathon_id}")]
    VersionConflict { hackathon_id: i64, version: i64 },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<StoreError> for RankingError {
    fn from(err: StoreError) -> Self {
        RankingError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_error_code() {
        let err = RankingError::MissingVotes("2 teams incomplete".to_string());
        assert_eq!(err.to_string(), "MISSING_VOTES: 2 teams incomplete");
        assert_eq!(err.code(), MISSING_VOTES);
        assert_eq!(err.message(), "2 teams incomplete");
    }

    #[test]
    fn store_errors_surface_as_internal() {
        let err: RankingError = StoreError::Storage("disk full".to_string()).into();
        assert_eq!(err.code(), INTERNAL_ERROR);
        assert!(err.message().contains("disk full"));
    }
}
