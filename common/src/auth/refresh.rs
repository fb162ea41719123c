use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::cache::{keys, CacheClient};
use crate::error::AppError;

/// A live refresh token. The token is valid exactly as long as its `jti`
/// is present in the cache; rotation and revocation both remove the key,
/// expiry is handled by the cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub jti: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    cache: CacheClient,
    ttl_seconds: u64,
}

impl RefreshTokenStore {
    pub fn new(cache: CacheClient, ttl_days: u64) -> Self {
        Self {
            cache,
            ttl_seconds: ttl_days * 24 * 60 * 60,
        }
    }

    /// Issues a fresh token for `subject` (login, or the new half of a
    /// rotation).
    pub async fn issue(&self, subject: &str) -> RefreshTokenRecord {
        let jti = Uuid::new_v4().to_string();
        let record = RefreshTokenRecord {
            jti: jti.clone(),
            subject: subject.to_string(),
            expires_at: Utc::now() + Duration::seconds(self.ttl_seconds.min(i64::MAX as u64) as i64),
        };
        let stored = self
            .cache
            .set(&keys::refresh_token(&jti), subject, Some(self.ttl_seconds))
            .await;
        if !stored {
            warn!(subject, "refresh token not persisted, cache unavailable");
        }
        record
    }

    /// Resolves a `jti` to its subject; unknown or expired tokens fail.
    pub async fn verify(&self, jti: &str) -> Result<String, AppError> {
        self.cache
            .get(&keys::refresh_token(jti))
            .await
            .ok_or(AppError::AuthInvalid)
    }

    /// Refresh flow: the presented `jti` is consumed and a new token is
    /// issued for the same subject. Replaying the old `jti` fails.
    pub async fn rotate(&self, jti: &str) -> Result<RefreshTokenRecord, AppError> {
        let subject = self.verify(jti).await?;
        self.cache.delete(&keys::refresh_token(jti)).await;
        Ok(self.issue(&subject).await)
    }

    /// Logout: drops the token regardless of validity.
    pub async fn revoke(&self, jti: &str) -> bool {
        self.cache.delete(&keys::refresh_token(jti)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use std::sync::Arc;

    fn store() -> RefreshTokenStore {
        RefreshTokenStore::new(
            CacheClient::with_backend(Arc::new(MemoryBackend::new())),
            7,
        )
    }

    #[tokio::test]
    async fn issued_token_verifies_to_subject() {
        let store = store();
        let record = store.issue("user-42").await;
        assert_eq!(store.verify(&record.jti).await.unwrap(), "user-42");
        assert!(record.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn rotation_invalidates_the_old_jti() {
        let store = store();
        let first = store.issue("user-42").await;

        let second = store.rotate(&first.jti).await.unwrap();
        assert_ne!(first.jti, second.jti);
        assert_eq!(second.subject, "user-42");

        // Replaying the consumed jti is rejected, the new one works.
        assert!(matches!(
            store.rotate(&first.jti).await,
            Err(AppError::AuthInvalid)
        ));
        let third = store.rotate(&second.jti).await.unwrap();
        assert_eq!(third.subject, "user-42");
    }

    #[tokio::test]
    async fn revoked_token_fails_verification() {
        let store = store();
        let record = store.issue("user-7").await;
        assert!(store.revoke(&record.jti).await);
        assert!(matches!(
            store.verify(&record.jti).await,
            Err(AppError::AuthInvalid)
        ));
    }

    #[tokio::test]
    async fn unknown_jti_is_rejected() {
        let store = store();
        assert!(matches!(
            store.verify("no-such-token").await,
            Err(AppError::AuthInvalid)
        ));
    }
}
