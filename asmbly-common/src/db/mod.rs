//! Database schema, models and keyed writes

pub mod counts;
pub mod init;
pub mod members;
pub mod migrations;
pub mod models;

pub use counts::*;
pub use init::*;
pub use members::*;
pub use migrations::*;
pub use models::*;
