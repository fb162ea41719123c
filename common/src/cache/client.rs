use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::backend::{CacheBackend, RedisBackend};
use crate::error::AppError;

/// Cache facade over an optional backend. Every operation degrades to the
/// neutral miss / no-op value when no backend is connected, so callers
/// never branch on availability themselves.
#[derive(Clone)]
pub struct CacheClient {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl CacheClient {
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Connects to Redis; a failed connection yields a disabled client and
    /// a warning rather than an error.
    pub async fn connect(url: &str) -> Self {
        match RedisBackend::connect(url).await {
            Ok(backend) => Self::with_backend(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, "cache connection failed, running without cache");
                Self::disabled()
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "cache get failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.set(key, value, ttl_seconds).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key, "cache set failed");
                false
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, key, "cache entry failed to deserialize, treating as miss");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> bool {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, key, "cache value failed to serialize");
                return false;
            }
        };
        self.set(key, &serialized, ttl_seconds).await
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, key, "cache delete failed");
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, key, "cache exists failed");
                false
            }
        }
    }

    /// Best-effort snapshot; never rely on this for correctness-critical
    /// iteration.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };
        match backend.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, pattern, "cache keys failed");
                Vec::new()
            }
        }
    }

    pub async fn clear(&self, pattern: &str) -> u64 {
        let keys = self.keys(pattern).await;
        let mut removed = 0;
        for key in keys {
            if self.delete(&key).await {
                removed += 1;
            }
        }
        removed
    }

    pub async fn incr(&self, key: &str, amount: i64) -> Option<i64> {
        let backend = self.backend.as_ref()?;
        match backend.incr(key, amount).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, key, "cache incr failed");
                None
            }
        }
    }

    pub async fn ping(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        backend.ping().await.is_ok()
    }

    /// Propagates errors so the rate limiter can decide to fail open.
    pub async fn admit_window(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: u64,
    ) -> Result<(bool, u32), AppError> {
        match self.backend.as_ref() {
            Some(backend) => backend.admit_window(key, window_seconds, limit, now).await,
            None => Err(AppError::InternalError("cache disabled".to_string())),
        }
    }
}
