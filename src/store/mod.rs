//! Record store interface
//!
//! The store is a black-box document interface: records are JSON objects
//! keyed by `(collection, id)`, and every backend offers find-by-id,
//! find-by-filter, save, and delete. Three implementations exist:
//!
//! - [`LocalStore`]: JSON files on disk (the direct write path)
//! - [`HttpStore`]: the shared record API over HTTP
//! - [`HybridStore`]: API-first with per-operation fallback to direct

mod http;
mod hybrid;
mod local;

pub use http::HttpStore;
pub use hybrid::HybridStore;
pub use local::LocalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::Result;

/// A conjunctive record filter: equality matches plus an optional
/// updated-since bound (the polling watermark).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    eq: Vec<(String, Value)>,
    updated_after: Option<DateTime<Utc>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.eq.push((field.to_string(), value.into()));
        self
    }

    /// Require `updated > watermark`
    pub fn updated_after(mut self, watermark: DateTime<Utc>) -> Self {
        self.updated_after = Some(watermark);
        self
    }

    /// Evaluate against a record (used by the local store)
    pub fn matches(&self, record: &Value) -> bool {
        for (field, expected) in &self.eq {
            if record.get(field) != Some(expected) {
                return false;
            }
        }
        if let Some(watermark) = self.updated_after {
            let updated = record
                .get("updated")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            match updated {
                Some(ts) if ts > watermark => {}
                _ => return false,
            }
        }
        true
    }

    /// Render as a record-API filter expression, e.g.
    /// `board='b1' && updated>'2026-01-01T00:00:00Z'`
    pub fn to_query(&self) -> String {
        let mut parts: Vec<String> = self
            .eq
            .iter()
            .map(|(field, value)| match value {
                Value::String(s) => format!("{field}='{}'", s.replace('\'', "\\'")),
                other => format!("{field}={other}"),
            })
            .collect();
        if let Some(watermark) = self.updated_after {
            parts.push(format!("updated>'{}'", watermark.to_rfc3339()));
        }
        parts.join(" && ")
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_empty() && self.updated_after.is_none()
    }
}

/// Black-box document store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by id; `Ok(None)` when the record does not exist
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Fetch all records matching the filter
    async fn find_by_filter(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// Create or update a record. A record without an `id` field (or with an
    /// empty one) is created and assigned one; the stored record is returned
    /// with `created`/`updated` stamped.
    async fn save(&self, collection: &str, record: Value) -> Result<Value>;

    /// Delete a record by id
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Extract the `id` field of a record, if present and non-empty
pub(crate) fn record_id(record: &Value) -> Option<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}
