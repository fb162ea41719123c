use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{keys, CacheClient};
use crate::error::AppError;
use crate::utils::config::AppConfig;

/// Paths that never count against a caller's window.
const SKIP_PATHS: &[&str] = &["/health", "/docs", "/openapi.json", "/redoc", "/metrics"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTier {
    Basic,
    Professional,
    Enterprise,
}

impl RateLimitTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "professional" | "pro" => Self::Professional,
            "enterprise" => Self::Enterprise,
            _ => Self::Basic,
        }
    }
}

impl std::fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// 0 means unlimited.
    pub limit: u32,
    pub current: u32,
    pub remaining: u32,
    pub reset: Option<u64>,
    pub retry_after: Option<u64>,
}

impl RateDecision {
    fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: 0,
            current: 0,
            remaining: 0,
            reset: None,
            retry_after: None,
        }
    }
}

/// Sliding-window limiter over the shared cache backend. Admission per
/// identity is linearizable because the window update is a single atomic
/// backend call; if the cache is unavailable the limiter fails open.
#[derive(Clone)]
pub struct RateLimiter {
    cache: CacheClient,
    basic_limit: u32,
    professional_limit: u32,
    window_seconds: u64,
}

impl RateLimiter {
    pub fn new(cache: CacheClient, config: &AppConfig) -> Self {
        Self {
            cache,
            basic_limit: config.rate_limit_basic,
            professional_limit: config.rate_limit_pro,
            window_seconds: config.rate_limit_window_seconds,
        }
    }

    pub fn should_skip(path: &str) -> bool {
        SKIP_PATHS.iter().any(|skip| path.starts_with(skip))
    }

    /// Authenticated subject wins; otherwise the first hop of the trusted
    /// forwarded-for header, then the peer address.
    pub fn resolve_identity(
        subject: Option<&str>,
        forwarded_for: Option<&str>,
        peer_address: &str,
    ) -> String {
        if let Some(subject) = subject {
            return subject.to_string();
        }
        if let Some(forwarded) = forwarded_for {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        peer_address.to_string()
    }

    fn limit_for(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Basic => self.basic_limit,
            RateLimitTier::Professional => self.professional_limit,
            RateLimitTier::Enterprise => 0,
        }
    }

    pub async fn check(&self, identity: &str, tier: RateLimitTier) -> RateDecision {
        let limit = self.limit_for(tier);
        if limit == 0 {
            return RateDecision::unlimited();
        }

        let key = keys::rate_limit(tier.as_str(), identity);
        let now = Utc::now().timestamp().max(0) as u64;

        match self
            .cache
            .admit_window(&key, self.window_seconds, limit, now)
            .await
        {
            Ok((true, count)) => RateDecision {
                allowed: true,
                limit,
                current: count,
                remaining: limit.saturating_sub(count),
                reset: Some(now + self.window_seconds),
                retry_after: None,
            },
            Ok((false, count)) => RateDecision {
                allowed: false,
                limit,
                current: count,
                remaining: 0,
                reset: Some(now + self.window_seconds),
                retry_after: Some(self.window_seconds),
            },
            Err(e) => {
                // Availability over throttling in degraded mode.
                warn!(error = %e, identity, tier = %tier, "rate limit check failed, failing open");
                RateDecision::unlimited()
            }
        }
    }

    /// Convenience wrapper mapping a denial onto the error taxonomy.
    pub async fn admit(&self, identity: &str, tier: RateLimitTier) -> Result<RateDecision, AppError> {
        let decision = self.check(identity, tier).await;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(AppError::RateLimited {
                retry_after: decision.retry_after.unwrap_or(self.window_seconds),
            })
        }
    }
}
