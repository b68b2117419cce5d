//! Error types for payer resolution

use thiserror::Error;

/// Result type used across the library
pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Error, Debug)]
pub enum ResolverError {
    /// A raw record is missing a required field. Never fatal to a run.
    #[error("Malformed detail record {detail_id}: {reason}")]
    MalformedInput { detail_id: i64, reason: String },

    /// A command referenced a payer that does not exist
    #[error("Payer not found: {0}")]
    PayerNotFound(String),

    /// A command referenced a detail record that does not exist
    #[error("Detail record not found: {0}")]
    DetailNotFound(i64),

    /// A batch could not be written; its writes were rolled back
    #[error("Commit failed for batch {batch}: {source}")]
    CommitFailure {
        batch: usize,
        #[source]
        source: Box<ResolverError>,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResolverError {
    /// True for errors caused by a missing payer or detail reference
    pub fn is_referential_gap(&self) -> bool {
        matches!(
            self,
            ResolverError::PayerNotFound(_) | ResolverError::DetailNotFound(_)
        )
    }
}
