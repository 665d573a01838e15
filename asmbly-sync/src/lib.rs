//! asmbly-sync library interface
//!
//! Scheduled jobs that pull membership data from Neon CRM and maintain the
//! analytics tables: daily counts with churn/join reconciliation, churn-risk
//! scores, and member zip codes.

pub mod aggregate;
pub mod crm;
pub mod error;
pub mod membership;
pub mod reconcile;
pub mod risk;
pub mod zip;

pub use crate::error::{SyncError, SyncResult};
pub use crate::reconcile::{DailyStore, ReconciliationDriver, RunStage, RunSummary, SqliteDailyStore};
