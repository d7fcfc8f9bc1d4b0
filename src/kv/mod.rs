//! Store adapter: a thin async facade over key-value primitives.
//!
//! The cache and index tiers are written against [`KvStore`], never against a
//! concrete client. Production wires up [`RedisStore`]; tests and local
//! development inject [`MemoryStore`].

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::RedisStore;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value command failed: {0}")]
    Command(String),
    #[error("malformed value at `{key}`: {message}")]
    Codec { key: String, message: String },
}

impl KvError {
    pub fn command(err: impl std::fmt::Display) -> Self {
        Self::Command(err.to_string())
    }

    pub fn codec(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Codec {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Key-value primitives the subsystem relies on: strings with expiry, sets,
/// sorted sets, cursor-bounded pattern scan, and health probes.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// concurrently; no method holds locks across awaits.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, KvError>;

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, KvError>;

    /// Remaining time to live; `None` for a key with no expiry or no key.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), KvError>;

    async fn zrem(&self, key: &str, member: &str) -> Result<(), KvError>;

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, KvError>;

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), KvError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), KvError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError>;

    /// Members present in every listed set.
    async fn sinter(&self, keys: &[String]) -> Result<Vec<String>, KvError>;

    /// All keys matching a glob pattern, walked with a bounded cursor so a
    /// large keyspace never materializes server-side in one reply.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError>;

    async fn ping(&self) -> Result<(), KvError>;

    /// Server identification string for diagnostics.
    async fn server_info(&self) -> Result<String, KvError>;

    async fn dbsize(&self) -> Result<u64, KvError>;
}
