//! Redis-backed implementation of the store adapter.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tracing::info;

use super::{KvError, KvStore};

const SCAN_COUNT: usize = 200;

/// Redis adapter with an auto-reconnecting connection manager.
///
/// Constructed explicitly and injected; there is no process-wide client.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Open a client and establish the managed connection.
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        info!("key-value store connected");
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

fn map_redis_error(err: RedisError) -> KvError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        KvError::Unavailable(err.to_string())
    } else {
        KvError::Command(err.to_string())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        conn.del(keys.to_vec()).await.map_err(map_redis_error)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, KvError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        redis::cmd("MGET")
            .arg(keys.to_vec())
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let mut conn = self.conn();
        let secs: i64 = conn.ttl(key).await.map_err(map_redis_error)?;
        // -2 = missing key, -1 = no expiry
        if secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(secs as u64)))
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), KvError> {
        let mut conn = self.conn();
        conn.zadd(key, member, score)
            .await
            .map_err(map_redis_error)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut conn = self.conn();
        conn.zrem(key, member).await.map_err(map_redis_error)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, KvError> {
        let mut conn = self.conn();
        conn.zscore(key, member).await.map_err(map_redis_error)
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), KvError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        conn.sadd(key, members.to_vec())
            .await
            .map_err(map_redis_error)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), KvError> {
        let mut conn = self.conn();
        conn.srem(key, member).await.map_err(map_redis_error)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn();
        conn.smembers(key).await.map_err(map_redis_error)
    }

    async fn sinter(&self, keys: &[String]) -> Result<Vec<String>, KvError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        conn.sinter(keys.to_vec()).await.map_err(map_redis_error)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), KvError> {
        let mut conn = self.conn();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_redis_error)
    }

    async fn server_info(&self) -> Result<String, KvError> {
        let mut conn = self.conn();
        let raw: String = redis::cmd("INFO")
            .arg("server")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(parse_server_version(&raw))
    }

    async fn dbsize(&self) -> Result<u64, KvError> {
        let mut conn = self.conn();
        redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

fn parse_server_version(info: &str) -> String {
    info.lines()
        .find_map(|line| line.strip_prefix("redis_version:"))
        .map(|v| format!("redis {}", v.trim()))
        .unwrap_or_else(|| "redis (unknown version)".to_string())
}
