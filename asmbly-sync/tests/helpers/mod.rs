//! Test Helper Utilities
//!
//! Shared utilities for testing asmbly-sync

#![allow(dead_code)]

pub mod fake_crm;

pub use fake_crm::FakeCrm;

use chrono::NaiveDate;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
