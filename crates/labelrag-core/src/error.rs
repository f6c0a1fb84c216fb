use crate::types::Strategy;
use thiserror::Error;

/// Failures surfaced by the retrieval core.
///
/// Exhausting every fallback strategy is NOT an error: `retrieve_with_info`
/// degrades to an empty hit list in that case. `Strategy` is only returned
/// when the caller pinned a single strategy, since there is nothing left to
/// fall back to.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("strategy {strategy} failed: {source}")]
    Strategy {
        strategy: Strategy,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, RetrieveError>;
