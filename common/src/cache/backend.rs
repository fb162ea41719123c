use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::AppError;

/// Atomic sliding-window admission. Evicts timestamps older than the
/// window, counts the remainder, and inserts the new timestamp only when
/// the count is below the limit. Runs as one uninterruptible unit.
const ADMIT_WINDOW_SCRIPT: &str = r"
local key = KEYS[1]
local window = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local current_time = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', current_time - window)

local current_count = redis.call('ZCARD', key)

if limit > 0 and current_count >= limit then
    return {0, current_count}
end

redis.call('ZADD', key, current_time, current_time)
redis.call('EXPIRE', key, window)

return {1, current_count + 1}
";

/// Storage operations required from a cache backend. The rate limiter
/// relies on `admit_window` being linearizable per key.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError>;
    async fn incr(&self, key: &str, amount: i64) -> Result<i64, AppError>;
    async fn ping(&self) -> Result<(), AppError>;
    /// Returns `(allowed, count_in_window)` after the atomic update.
    async fn admit_window(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: u64,
    ) -> Result<(bool, u32), AppError>;
}

/// Redis-backed implementation over a multiplexed async connection.
pub struct RedisBackend {
    connection: redis::aio::MultiplexedConnection,
    admit_script: redis::Script,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            connection,
            admit_script: redis::Script::new(ADMIT_WINDOW_SCRIPT),
        })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), AppError> {
        let mut conn = self.connection.clone();
        match ttl_seconds {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.connection.clone();
        Ok(conn.exists(key).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.connection.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn incr(&self, key: &str, amount: i64) -> Result<i64, AppError> {
        let mut conn = self.connection.clone();
        Ok(conn.incr(key, amount).await?)
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn admit_window(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: u64,
    ) -> Result<(bool, u32), AppError> {
        let mut conn = self.connection.clone();
        let (allowed, count): (i64, i64) = self
            .admit_script
            .key(key)
            .arg(window_seconds)
            .arg(limit)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;
        Ok((allowed == 1, count.max(0) as u32))
    }
}

#[derive(Debug)]
struct MemoryEntry {
    value: String,
    deadline: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    windows: HashMap<String, (Vec<u64>, Option<Instant>)>,
}

/// In-process backend used by tests and cache-less deployments that still
/// want working rate windows. Window admission holds the state lock for
/// the whole evict-count-insert sequence.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // Lock poisoning only happens after a panic in another holder;
        // the cached data is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn inner(pattern: &[u8], candidate: &[u8]) -> bool {
        match (pattern.first(), candidate.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pattern[1..], candidate)
                    || (!candidate.is_empty() && inner(pattern, &candidate[1..]))
            }
            (Some(p), Some(c)) if p == c => inner(&pattern[1..], &candidate[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), candidate.as_bytes())
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let now = Instant::now();
        let mut state = self.lock();
        let expired = state
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            state.entries.remove(key);
            return Ok(None);
        }
        Ok(state.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), AppError> {
        let deadline = ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl));
        self.lock().entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                deadline,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.lock().entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, AppError> {
        let now = Instant::now();
        let mut state = self.lock();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let mut matched: Vec<String> = state
            .entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn incr(&self, key: &str, amount: i64) -> Result<i64, AppError> {
        let now = Instant::now();
        let mut state = self.lock();
        let current = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.value.parse::<i64>().map_err(|_| {
                    AppError::InternalError(format!("non-integer value under key {key}"))
                })?
            }
            _ => 0,
        };
        let next = current + amount;
        let deadline = state.entries.get(key).and_then(|entry| entry.deadline);
        state.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: next.to_string(),
                deadline,
            },
        );
        Ok(next)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn admit_window(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: u64,
    ) -> Result<(bool, u32), AppError> {
        let mut state = self.lock();
        let (timestamps, deadline) = state
            .windows
            .entry(key.to_string())
            .or_insert_with(|| (Vec::new(), None));

        if deadline.is_some_and(|d| Instant::now() > d) {
            timestamps.clear();
        }
        let floor = now.saturating_sub(window_seconds);
        timestamps.retain(|&ts| ts > floor);

        let count = timestamps.len() as u32;
        if limit > 0 && count >= limit {
            return Ok((false, count));
        }

        timestamps.push(now);
        *deadline = Some(Instant::now() + Duration::from_secs(window_seconds));
        Ok((true, count + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_namespace_patterns() {
        assert!(glob_match("search:*", "search:abc123"));
        assert!(glob_match("drug:*:predictions", "drug:metformin:predictions"));
        assert!(!glob_match("search:*", "refresh:abc123"));
        assert!(glob_match("*", "anything"));
    }

    #[tokio::test]
    async fn memory_backend_round_trips_and_expires() {
        let backend = MemoryBackend::new();
        backend.set("drug:aspirin", "{\"name\":\"Aspirin\"}", Some(1)).await.unwrap();
        assert_eq!(
            backend.get("drug:aspirin").await.unwrap().as_deref(),
            Some("{\"name\":\"Aspirin\"}")
        );
        assert!(backend.exists("drug:aspirin").await.unwrap());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(backend.get("drug:aspirin").await.unwrap(), None);
        assert!(!backend.exists("drug:aspirin").await.unwrap());
    }

    #[tokio::test]
    async fn memory_backend_incr_counts_from_zero() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.incr("hits", 1).await.unwrap(), 1);
        assert_eq!(backend.incr("hits", 2).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn admit_window_denies_after_limit() {
        let backend = MemoryBackend::new();
        for i in 0..3 {
            let (allowed, count) = backend.admit_window("ratelimit:basic:me", 60, 3, 100).await.unwrap();
            assert!(allowed, "request {i} should be admitted");
            assert_eq!(count, i + 1);
        }
        let (allowed, count) = backend.admit_window("ratelimit:basic:me", 60, 3, 100).await.unwrap();
        assert!(!allowed);
        assert_eq!(count, 3);

        // Timestamps past the window are evicted and admission resumes.
        let (allowed, count) = backend.admit_window("ratelimit:basic:me", 60, 3, 161).await.unwrap();
        assert!(allowed);
        assert_eq!(count, 1);
    }
}
