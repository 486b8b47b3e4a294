//! Remote record storage and the per-guild repository built on top of it.
//!
//! The store layer moves opaque JSON objects under caller-supplied keys and
//! absorbs transient transport failures internally: reads degrade to an empty
//! object, writes report durability as a bool. The repository layer adds the
//! root index, per-guild credentials, and a write-through cache.

pub mod backends;
pub mod repo;
pub mod store;

pub use backends::http::HttpRecordStore;
pub use backends::memory::MemoryRecordStore;
pub use repo::GuildRepository;
pub use store::{JsonObject, RecordStore, RETRY_ATTEMPTS, RETRY_BACKOFF};
