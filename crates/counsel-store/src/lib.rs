//! Persistence layer for counsel
//!
//! Provides:
//! - Whole-document storage for clients, slots and sessions
//! - Per-document revision counters
//! - Audit log (append-only)

mod audit;
mod sqlite;
mod traits;

pub use audit::*;
pub use sqlite::*;
pub use traits::*;

use counsel_util::CounselError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for CounselError {
    fn from(e: StoreError) -> Self {
        CounselError::store(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
