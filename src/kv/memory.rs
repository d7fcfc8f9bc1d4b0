//! In-memory store adapter for tests and local development.
//!
//! Behaves like the Redis adapter for the subset of primitives the subsystem
//! uses: lazy TTL expiry on read, type-checked slots, glob pattern scan.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{KvError, KvStore};

#[derive(Debug, Clone)]
enum Slot {
    Text(String),
    Set(HashSet<String>),
    Sorted(HashMap<String, f64>),
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Slot::Text(_) => "string",
            Slot::Set(_) => "set",
            Slot::Sorted(_) => "zset",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Dashmap-backed fake honoring the [`KvStore`] contract.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an expired entry and report whether a live one remains.
    fn purge_expired(&self, key: &str) -> bool {
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired() {
                return true;
            }
        } else {
            return false;
        }
        self.entries.remove(key);
        false
    }

    fn wrong_type(key: &str, found: &Entry) -> KvError {
        KvError::Command(format!(
            "wrong slot type at `{key}`: found {}",
            found.slot.kind()
        ))
    }

    /// Number of live keys, for test assertions.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Minimal glob match supporting `*` wildcards, enough for namespace scans.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == parts.len() - 1 && !pattern.ends_with('*') {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        if !self.purge_expired(key) {
            return Ok(None);
        }
        match self.entries.get(key) {
            Some(entry) => match &entry.slot {
                Slot::Text(value) => Ok(Some(value.clone())),
                _ => Err(Self::wrong_type(key, &entry)),
            },
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, KvError> {
        let mut removed = 0;
        for key in keys {
            if self.purge_expired(key) && self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, KvError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        if !self.purge_expired(key) {
            return Ok(None);
        }
        Ok(self.entries.get(key).and_then(|entry| {
            entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))
        }))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        if !self.purge_expired(key) {
            return Ok(());
        }
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), KvError> {
        self.purge_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Sorted(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.slot {
            Slot::Sorted(scores) => {
                scores.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(Self::wrong_type(key, &entry)),
        }
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), KvError> {
        if !self.purge_expired(key) {
            return Ok(());
        }
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.slot {
                Slot::Sorted(scores) => {
                    scores.remove(member);
                }
                _ => return Err(Self::wrong_type(key, &entry)),
            }
        }
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, KvError> {
        if !self.purge_expired(key) {
            return Ok(None);
        }
        match self.entries.get(key) {
            Some(entry) => match &entry.slot {
                Slot::Sorted(scores) => Ok(scores.get(member).copied()),
                _ => Err(Self::wrong_type(key, &entry)),
            },
            None => Ok(None),
        }
    }

    async fn sadd(&self, key: &str, members: &[String]) -> Result<(), KvError> {
        if members.is_empty() {
            return Ok(());
        }
        self.purge_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut entry.slot {
            Slot::Set(set) => {
                set.extend(members.iter().cloned());
                Ok(())
            }
            _ => Err(Self::wrong_type(key, &entry)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), KvError> {
        if !self.purge_expired(key) {
            return Ok(());
        }
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.slot {
                Slot::Set(set) => {
                    set.remove(member);
                }
                _ => return Err(Self::wrong_type(key, &entry)),
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, KvError> {
        if !self.purge_expired(key) {
            return Ok(Vec::new());
        }
        match self.entries.get(key) {
            Some(entry) => match &entry.slot {
                Slot::Set(set) => Ok(set.iter().cloned().collect()),
                _ => Err(Self::wrong_type(key, &entry)),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn sinter(&self, keys: &[String]) -> Result<Vec<String>, KvError> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(Vec::new());
        };
        let mut intersection: HashSet<String> = self.smembers(first).await?.into_iter().collect();
        for key in rest {
            if intersection.is_empty() {
                break;
            }
            let members: HashSet<String> = self.smembers(key).await?.into_iter().collect();
            intersection.retain(|member| members.contains(member));
        }
        Ok(intersection.into_iter().collect())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.value().expired())
            .map(|entry| entry.key().clone())
            .filter(|key| glob_match(pattern, key))
            .collect())
    }

    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }

    async fn server_info(&self) -> Result<String, KvError> {
        Ok("memory".to_string())
    }

    async fn dbsize(&self) -> Result<u64, KvError> {
        Ok(self.len() as u64)
    }
}
