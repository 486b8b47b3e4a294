//! The record store capability.

use std::future::Future;
use std::time::Duration;

/// Attempts made before a read or write is declared failed.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// An opaque JSON object as moved through the store.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Keyed storage for JSON records, addressed by record key plus credential.
///
/// Implementations retry internally ([`RETRY_ATTEMPTS`] attempts with
/// [`RETRY_BACKOFF`] between them) and never surface transport errors:
/// an exhausted read yields an empty object and an exhausted write yields
/// `false`. Callers that need to distinguish "missing" from "unreachable"
/// cannot — the repository layer is written around that contract.
pub trait RecordStore: Send + Sync {
    /// Fetch the record stored under `key`. Empty object on failure.
    fn fetch(
        &self,
        key: &str,
        master_key: &str,
    ) -> impl Future<Output = JsonObject> + Send;

    /// Replace the record stored under `key`. Returns whether the store
    /// acknowledged the write.
    fn put(
        &self,
        key: &str,
        master_key: &str,
        record: &JsonObject,
    ) -> impl Future<Output = bool> + Send;

    /// Single-shot credential check used by the setup flow. No retries:
    /// the caller wants an immediate verdict on the supplied keys.
    fn probe(&self, key: &str, master_key: &str) -> impl Future<Output = bool> + Send;
}
