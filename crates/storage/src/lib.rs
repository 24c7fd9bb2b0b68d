//! Durable key-value storage and the shared TTL cache.

pub mod cache;
pub mod kv;

pub use cache::{cache_key, CacheEntry, ExpiringCache};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
