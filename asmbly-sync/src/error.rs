//! Error types for asmbly-sync
//!
//! Job errors are either upstream (CRM) or local (database, config, model).
//! Any of them aborts the running job; malformed individual records are not
//! errors at this level and are skipped where they are parsed.

use crate::crm::CrmError;
use thiserror::Error;

/// Job error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// CRM request failed permanently
    #[error("CRM error: {0}")]
    Crm(#[from] CrmError),

    /// asmbly-common error (database, config, persistence conflict)
    #[error(transparent)]
    Common(#[from] asmbly_common::Error),

    /// Risk model could not be loaded
    #[error("Risk model error: {0}")]
    Model(String),
}

/// Result type for job operations
pub type SyncResult<T> = Result<T, SyncError>;

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Common(asmbly_common::Error::Database(err))
    }
}
