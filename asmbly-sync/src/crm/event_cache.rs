//! Run-scoped event metadata cache
//!
//! Many members register for the same classes, so event lookups repeat a
//! lot within one risk-scoring run. The cache is created per run, handed to
//! the fetch collaborator, and dropped with the run. It holds at most
//! `capacity` events and evicts the oldest insert first.

use crate::crm::MalformedRecord;
use asmbly_common::time::parse_iso_date;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Category name given to events without one
pub const UNCATEGORIZED: &str = "None";

/// What risk scoring needs to know about an event
#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo {
    /// Class name without the instructor suffix (`"Woodshop Safety w/ Sam"` -> `"Woodshop Safety"`)
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub category: String,
}

impl EventInfo {
    /// Parse a `GET /v2/events/{id}` response; `name` is required
    pub fn from_json(event_id: i64, value: &Value) -> Result<Self, MalformedRecord> {
        let label = format!("event {}", event_id);
        let full_name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| MalformedRecord::missing(label.clone(), "name"))?;
        let name = full_name
            .split(" w/")
            .next()
            .unwrap_or(full_name)
            .trim()
            .to_string();

        let start_date = match value.pointer("/eventDates/startDate").and_then(Value::as_str) {
            None => None,
            Some(s) => Some(
                parse_iso_date(s)
                    .ok_or_else(|| MalformedRecord::invalid(label.clone(), "eventDates.startDate", s))?,
            ),
        };

        let category = value
            .pointer("/category/name")
            .and_then(Value::as_str)
            .unwrap_or(UNCATEGORIZED)
            .to_string();

        Ok(Self {
            name,
            start_date,
            category,
        })
    }
}

struct CacheInner {
    entries: HashMap<i64, EventInfo>,
    order: VecDeque<i64>,
    hits: u64,
    misses: u64,
}

/// Bounded event id -> [`EventInfo`] map shared by one run's workers
pub struct EventCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

/// Hit/miss counters for the run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl EventCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn get(&self, event_id: i64) -> Option<EventInfo> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let found = inner.entries.get(&event_id).cloned();
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    pub fn insert(&self, event_id: i64, info: EventInfo) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.insert(event_id, info).is_some() {
            return;
        }
        inner.order.push_back(event_id);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}
