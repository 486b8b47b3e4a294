//! Record store backed by a JSONBin-style HTTP record host.
//!
//! Wire shape: `GET {base}/{key}/latest` returns `{"record": {...}, ...}`,
//! `PUT {base}/{key}` replaces the record wholesale. The access credential
//! travels in the `X-Master-Key` header on every request.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{JsonObject, RecordStore, RETRY_ATTEMPTS, RETRY_BACKOFF};

pub const DEFAULT_BASE_URL: &str = "https://api.jsonbin.io/v3/b";

const MASTER_KEY_HEADER: &str = "X-Master-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn read_url(&self, key: &str) -> String {
        format!("{}/{}/latest", self.base_url, key)
    }

    fn write_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn fetch_once(&self, key: &str, master_key: &str) -> Result<JsonObject, String> {
        let response = self
            .client
            .get(self.read_url(key))
            .header(MASTER_KEY_HEADER, master_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }
        let body: Value = response.json().await.map_err(|e| e.to_string())?;
        // Responses wrap the stored document in a "record" envelope.
        match body.get("record") {
            Some(Value::Object(record)) => Ok(record.clone()),
            Some(other) => Err(format!("record is not an object: {other}")),
            None => Err("response has no record field".to_string()),
        }
    }

    async fn put_once(&self, key: &str, master_key: &str, record: &JsonObject) -> Result<(), String> {
        let response = self
            .client
            .put(self.write_url(key))
            .header(MASTER_KEY_HEADER, master_key)
            .timeout(REQUEST_TIMEOUT)
            .json(record)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("status {status}"))
        }
    }
}

impl RecordStore for HttpRecordStore {
    async fn fetch(&self, key: &str, master_key: &str) -> JsonObject {
        for attempt in 1..=RETRY_ATTEMPTS {
            match self.fetch_once(key, master_key).await {
                Ok(record) => {
                    debug!(key, attempt, "record fetched");
                    return record;
                }
                Err(reason) => {
                    warn!(key, attempt, %reason, "record fetch failed");
                }
            }
            if attempt < RETRY_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        warn!(key, "record fetch exhausted retries, returning empty record");
        JsonObject::new()
    }

    async fn put(&self, key: &str, master_key: &str, record: &JsonObject) -> bool {
        for attempt in 1..=RETRY_ATTEMPTS {
            match self.put_once(key, master_key, record).await {
                Ok(()) => {
                    debug!(key, attempt, "record written");
                    return true;
                }
                Err(reason) => {
                    warn!(key, attempt, %reason, "record write failed");
                }
            }
            if attempt < RETRY_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        warn!(key, "record write exhausted retries");
        false
    }

    async fn probe(&self, key: &str, master_key: &str) -> bool {
        match self
            .client
            .get(self.read_url(key))
            .header(MASTER_KEY_HEADER, master_key)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(reason) => {
                warn!(key, %reason, "credential probe failed");
                false
            }
        }
    }
}
