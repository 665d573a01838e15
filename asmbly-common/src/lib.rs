//! # Asmbly Common Library
//!
//! Shared code for the Asmbly membership analytics services:
//! - Error type used across crates
//! - Configuration loading (TOML bootstrap, environment, CLI overrides)
//! - SQLite schema, migrations and persisted models
//! - Reporting-date helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
