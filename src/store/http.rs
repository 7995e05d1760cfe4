//! Record API client
//!
//! Talks to the store host's HTTP surface: `/api/health` for reachability,
//! `/api/collections/{name}/records` for CRUD. Responses at or above 400
//! are failures; the body is carried into the error for diagnostics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::{record_id, Filter, RecordStore};
use crate::errors::{CoreError, Result};

/// Budget for the per-operation health probe
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Overall request timeout for record operations
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `/api/health` within the 500 ms budget.
    /// Any error or non-2xx counts as unreachable.
    pub async fn health(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        let probe = self
            .client
            .get(&url)
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await;
        match probe {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                false
            }
        }
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{collection}/records", self.base_url)
    }

    /// Turn a non-success response into an error with the body surfaced.
    /// 409 marks a commit-time invariant violation and maps to `Conflict`
    /// so callers run their re-read-and-retry loop instead of failing over.
    async fn surface_failure(collection: &str, id: &str, resp: reqwest::Response) -> CoreError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return CoreError::conflict(collection, id, body);
        }
        CoreError::transient(format!("record API {status}: {body}"))
    }
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let url = format!("{}/{id}", self.records_url(collection));
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::surface_failure(collection, id, resp).await);
        }
        Ok(Some(resp.json().await?))
    }

    async fn find_by_filter(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let mut request = self.client.get(self.records_url(collection));
        if !filter.is_empty() {
            request = request.query(&[("filter", filter.to_query())]);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(Self::surface_failure(collection, "", resp).await);
        }
        let body: Value = resp.json().await?;
        // The API pages results under `items`; a bare array is accepted too.
        let items = body
            .get("items")
            .cloned()
            .unwrap_or(body);
        match items {
            Value::Array(records) => Ok(records),
            other => Err(CoreError::transient(format!(
                "record API returned non-list body: {other}"
            ))),
        }
    }

    async fn save(&self, collection: &str, record: Value) -> Result<Value> {
        let id = record_id(&record).map(str::to_string);
        let resp = match &id {
            Some(id) => {
                let url = format!("{}/{id}", self.records_url(collection));
                self.client.patch(&url).json(&record).send().await?
            }
            None => {
                self.client
                    .post(self.records_url(collection))
                    .json(&record)
                    .send()
                    .await?
            }
        };
        if !resp.status().is_success() {
            return Err(Self::surface_failure(collection, id.as_deref().unwrap_or(""), resp).await);
        }
        Ok(resp.json().await?)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let url = format!("{}/{id}", self.records_url(collection));
        let resp = self.client.delete(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(CoreError::not_found("record", id));
        }
        if !resp.status().is_success() {
            return Err(Self::surface_failure(collection, id, resp).await);
        }
        Ok(())
    }
}
