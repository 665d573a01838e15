//! HTTP API handlers for asmbly-dash

pub mod buildinfo;
pub mod counts;
pub mod health;
pub mod members;

pub use buildinfo::get_build_info;
pub use counts::{churns_joins, counts_summary, list_counts};
pub use health::health_routes;
pub use members::{risk_table, set_emailed, zip_counts};
