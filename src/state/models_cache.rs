use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{summarize_upstream_body, ProxyError};
use crate::transport::{BrowserProfile, HttpTransport};

/// An upstream-provided model object, passed through with its extra fields
/// preserved. Records without a non-empty `id` are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub owned_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_object() -> String {
    "model".to_string()
}

struct Snapshot {
    records: Arc<Vec<ModelRecord>>,
    fetched_at: Instant,
}

/// TTL-cached model catalog with single-flight refresh and stale fallback.
///
/// Data served to callers is either fresh (age < TTL) or the most recent
/// successfully-fetched snapshot, served stale only when a refresh attempt
/// fails. Concurrent cache misses share one upstream fetch.
pub(crate) struct ModelCatalog {
    ttl: Duration,
    blacklist: Vec<String>,
    snapshot: RwLock<Option<Snapshot>>,
    refresh: tokio::sync::Mutex<()>,
}

impl ModelCatalog {
    #[must_use]
    pub(crate) fn new(ttl_secs: u64, blacklist: &[String]) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            blacklist: blacklist
                .iter()
                .map(|keyword| keyword.to_ascii_lowercase())
                .collect(),
            snapshot: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) async fn get_models(
        &self,
        transport: &HttpTransport,
        browser: &BrowserProfile,
        url: &str,
    ) -> Result<Arc<Vec<ModelRecord>>, ProxyError> {
        if let Some(records) = self.fresh_snapshot() {
            return Ok(records);
        }

        let _refresh_guard = self.refresh.lock().await;
        // A concurrent miss may have refreshed while we waited on the lock.
        if let Some(records) = self.fresh_snapshot() {
            return Ok(records);
        }

        match fetch_upstream_models(transport, browser, url).await {
            Ok(records) => {
                let records = Arc::new(self.apply_blacklist(records));
                *self.snapshot.write() = Some(Snapshot {
                    records: Arc::clone(&records),
                    fetched_at: Instant::now(),
                });
                Ok(records)
            }
            Err(err) => match self.any_snapshot() {
                Some(stale) => {
                    tracing::warn!(error = %err, "model catalog refresh failed, serving stale snapshot");
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    fn fresh_snapshot(&self) -> Option<Arc<Vec<ModelRecord>>> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref()?;
        (snapshot.fetched_at.elapsed() < self.ttl).then(|| Arc::clone(&snapshot.records))
    }

    fn any_snapshot(&self) -> Option<Arc<Vec<ModelRecord>>> {
        self.snapshot
            .read()
            .as_ref()
            .map(|snapshot| Arc::clone(&snapshot.records))
    }

    fn apply_blacklist(&self, records: Vec<ModelRecord>) -> Vec<ModelRecord> {
        if self.blacklist.is_empty() {
            return records;
        }
        records
            .into_iter()
            .filter(|record| {
                let id = record.id.to_ascii_lowercase();
                !self.blacklist.iter().any(|keyword| id.contains(keyword))
            })
            .collect()
    }
}

async fn fetch_upstream_models(
    transport: &HttpTransport,
    browser: &BrowserProfile,
    url: &str,
) -> Result<Vec<ModelRecord>, ProxyError> {
    let response = transport
        .send_request(url, http::Method::GET, browser.headers(false), bytes::Bytes::new())
        .await?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| ProxyError::Transport(format!("Failed to read models response: {e}")))?;

    if !status.is_success() {
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message: summarize_upstream_body(&body),
        });
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::Transport(format!("Invalid models response JSON: {e}")))?;

    // A response without the expected array is a fetch failure, not a
    // partial success.
    let Some(items) = payload.get("data").and_then(Value::as_array) else {
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message: "models response missing 'data' array".to_string(),
        });
    };

    Ok(items
        .iter()
        .filter_map(|item| serde_json::from_value::<ModelRecord>(item.clone()).ok())
        .filter(|record| !record.id.trim().is_empty())
        .collect())
}
