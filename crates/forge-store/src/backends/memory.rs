//! In-memory record store for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::store::{JsonObject, RecordStore};

/// Record store over a shared in-process map. Clones share state, so a test
/// can hold one handle while the code under test holds another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<HashMap<String, JsonObject>>>,
    fail_fetches: Arc<AtomicBool>,
    fail_puts: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a record directly, bypassing the store contract.
    pub fn seed(&self, key: impl Into<String>, record: JsonObject) {
        self.records.lock().unwrap().insert(key.into(), record);
    }

    /// Current contents under `key`, if any.
    pub fn snapshot(&self, key: &str) -> Option<JsonObject> {
        self.records.lock().unwrap().get(key).cloned()
    }

    /// Make subsequent fetches behave as if the host were unreachable.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent puts fail without touching stored state.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

impl RecordStore for MemoryRecordStore {
    async fn fetch(&self, key: &str, _master_key: &str) -> JsonObject {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return JsonObject::new();
        }
        self.records
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    async fn put(&self, key: &str, _master_key: &str, record: &JsonObject) -> bool {
        if self.fail_puts.load(Ordering::SeqCst) {
            return false;
        }
        self.records
            .lock()
            .unwrap()
            .insert(key.to_string(), record.clone());
        true
    }

    async fn probe(&self, key: &str, _master_key: &str) -> bool {
        !self.fail_fetches.load(Ordering::SeqCst)
            && self.records.lock().unwrap().contains_key(key)
    }
}
