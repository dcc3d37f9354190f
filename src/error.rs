// Domain error kinds for the indexing and hybrid-search core.
//
// Call chains that only need to propagate failures use `anyhow::Result`;
// call sites that need to branch on *what kind* of failure occurred (the
// ingestion pipeline, the hybrid-search constructor) use `CoreError`
// directly and convert with `?` at the boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transient network failure (retries remaining): {0}")]
    Transient(#[source] reqwest::Error),

    #[error("network failure after exhausting retries: {cause}")]
    Permanent { cause: String },

    #[error("parse error: {detail}")]
    Parse { detail: String },

    #[error("storage integrity violation: {0}")]
    StorageIntegrity(#[source] rusqlite::Error),

    #[error("vector index operation failed: {0}")]
    VectorOp(String),

    #[error("ingestion progress checkpoint has an unrecognized status")]
    ResumeStateCorrupt,

    #[error("database not found at {path}")]
    MissingDatabase { path: PathBuf },
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::StorageIntegrity(e)
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Transient(e)
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
