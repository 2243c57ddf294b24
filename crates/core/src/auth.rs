// Rate limiting and usage metering around the query operations

use crate::cache::{Clock, SystemClock};
use crate::error::{DiscoveryError, Result};
use crate::types::{RateLimitResult, Tier, UsageEvent};
use chrono::{DateTime, Months, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Fixed remaining budget reported for credential-less requests.
/// The public tier is currently permissive; requests are never refused.
pub const PUBLIC_TIER_REMAINING: i64 = 10;

/// Quota persistence contract. `check_and_decrement` must be atomic:
/// checking the budget and consuming one unit happen together.
#[async_trait::async_trait]
pub trait QuotaStore: Send + Sync {
    /// Returns `None` when the credential does not resolve to a record
    async fn check_and_decrement(&self, credential: &str) -> Result<Option<RateLimitResult>>;

    /// Append one usage event
    async fn append_usage(&self, event: UsageEvent) -> Result<()>;
}

pub struct RateLimiter {
    store: Arc<dyn QuotaStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Map a credential to its quota decision.
    ///
    /// Store failures fail open: the request is allowed but tagged with
    /// the `error` tier so the decision stays visible in logs.
    pub async fn check_quota(&self, credential: Option<&str>) -> RateLimitResult {
        let Some(credential) = credential else {
            return RateLimitResult {
                allowed: true,
                remaining: PUBLIC_TIER_REMAINING,
                tier: Tier::Public,
                credential_id: None,
            };
        };

        match self.store.check_and_decrement(credential).await {
            Ok(Some(result)) => result,
            Ok(None) => RateLimitResult {
                allowed: false,
                remaining: 0,
                tier: Tier::Invalid,
                credential_id: None,
            },
            Err(err) => {
                tracing::error!("quota check failed, allowing request: {}", err);
                RateLimitResult {
                    allowed: true,
                    remaining: 0,
                    tier: Tier::Error,
                    credential_id: None,
                }
            }
        }
    }

    /// Best-effort usage append. Absent credential is a no-op; failures
    /// are logged and never affect the primary response.
    pub async fn record_usage(
        &self,
        credential_id: Option<Uuid>,
        endpoint: &str,
        query: &str,
        response_time_ms: u64,
    ) {
        let Some(credential_id) = credential_id else {
            return;
        };

        let event = UsageEvent {
            credential_id,
            endpoint: endpoint.to_string(),
            query: query.to_string(),
            response_time_ms,
            timestamp: Utc::now(),
        };

        if let Err(err) = self.store.append_usage(event).await {
            tracing::error!("failed to record usage: {}", err);
        }
    }
}

struct CredentialRecord {
    id: Uuid,
    tier: Tier,
    used: u32,
    period_start: DateTime<Utc>,
}

/// In-process quota store. Credentials are issued with an immutable tier;
/// the remaining budget resets on the monthly period boundary.
pub struct InMemoryQuotaStore {
    credentials: Mutex<HashMap<String, CredentialRecord>>,
    usage: Mutex<Vec<UsageEvent>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            credentials: Mutex::new(HashMap::new()),
            usage: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Issue a new credential for a tier. The tier is fixed at creation.
    pub fn issue_key(&self, tier: Tier) -> Result<String> {
        if tier.monthly_limit().is_none() {
            return Err(DiscoveryError::validation(format!(
                "tier {} cannot be issued a key",
                tier
            )));
        }

        let key = format!(
            "mcp_{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        self.credentials.lock().unwrap().insert(
            key.clone(),
            CredentialRecord {
                id: Uuid::new_v4(),
                tier,
                used: 0,
                period_start: self.clock.now(),
            },
        );
        Ok(key)
    }

    pub fn usage_count(&self) -> usize {
        self.usage.lock().unwrap().len()
    }
}

impl Default for InMemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn check_and_decrement(&self, credential: &str) -> Result<Option<RateLimitResult>> {
        let now = self.clock.now();
        let mut credentials = self.credentials.lock().unwrap();

        let Some(record) = credentials.get_mut(credential) else {
            return Ok(None);
        };

        // Reset on the monthly boundary
        while now >= record.period_start + Months::new(1) {
            record.period_start = record.period_start + Months::new(1);
            record.used = 0;
        }

        let limit = record.tier.monthly_limit().unwrap_or(0);
        let allowed = record.used < limit;
        if allowed {
            record.used += 1;
        }

        Ok(Some(RateLimitResult {
            allowed,
            remaining: i64::from(limit.saturating_sub(record.used)),
            tier: record.tier,
            credential_id: Some(record.id),
        }))
    }

    async fn append_usage(&self, event: UsageEvent) -> Result<()> {
        self.usage.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now = *now + duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl QuotaStore for FailingStore {
        async fn check_and_decrement(&self, _: &str) -> Result<Option<RateLimitResult>> {
            Err(DiscoveryError::dependency("quota store unreachable"))
        }

        async fn append_usage(&self, _: UsageEvent) -> Result<()> {
            Err(DiscoveryError::dependency("quota store unreachable"))
        }
    }

    #[tokio::test]
    async fn test_absent_credential_is_public_and_allowed() {
        let limiter = RateLimiter::new(Arc::new(InMemoryQuotaStore::new()));
        let result = limiter.check_quota(None).await;

        assert!(result.allowed);
        assert_eq!(result.tier, Tier::Public);
        assert_eq!(result.remaining, PUBLIC_TIER_REMAINING);
        assert!(result.credential_id.is_none());
    }

    #[tokio::test]
    async fn test_unknown_credential_is_invalid() {
        let limiter = RateLimiter::new(Arc::new(InMemoryQuotaStore::new()));
        let result = limiter.check_quota(Some("mcp_deadbeef")).await;

        assert!(!result.allowed);
        assert_eq!(result.tier, Tier::Invalid);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let limiter = RateLimiter::new(Arc::new(FailingStore));
        let result = limiter.check_quota(Some("mcp_anything")).await;

        assert!(result.allowed);
        assert_eq!(result.tier, Tier::Error);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test]
    async fn test_budget_decrements_and_exhausts() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let key = store.issue_key(Tier::Free).unwrap();
        let limiter = RateLimiter::new(store);

        let first = limiter.check_quota(Some(&key)).await;
        assert!(first.allowed);
        assert_eq!(first.tier, Tier::Free);
        assert_eq!(first.remaining, 99);

        for _ in 0..99 {
            limiter.check_quota(Some(&key)).await;
        }

        let exhausted = limiter.check_quota(Some(&key)).await;
        assert!(!exhausted.allowed);
        assert_eq!(exhausted.remaining, 0);
    }

    #[tokio::test]
    async fn test_quota_resets_on_monthly_boundary() {
        let clock = ManualClock::new();
        let store = Arc::new(InMemoryQuotaStore::with_clock(clock.clone()));
        let key = store.issue_key(Tier::Free).unwrap();
        let limiter = RateLimiter::new(store);

        for _ in 0..100 {
            limiter.check_quota(Some(&key)).await;
        }
        assert!(!limiter.check_quota(Some(&key)).await.allowed);

        clock.advance(Duration::days(32));
        let fresh = limiter.check_quota(Some(&key)).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 99);
    }

    #[tokio::test]
    async fn test_record_usage_attributes_to_credential() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let key = store.issue_key(Tier::Pro).unwrap();
        let limiter = RateLimiter::new(store.clone());

        let decision = limiter.check_quota(Some(&key)).await;
        limiter
            .record_usage(decision.credential_id, "discover", "database", 42)
            .await;
        limiter.record_usage(None, "discover", "ignored", 1).await;

        assert_eq!(store.usage_count(), 1);
    }

    #[test]
    fn test_issue_key_rejects_non_issuable_tiers() {
        let store = InMemoryQuotaStore::new();
        assert!(store.issue_key(Tier::Public).is_err());
        assert!(store.issue_key(Tier::Invalid).is_err());

        let key = store.issue_key(Tier::Enterprise).unwrap();
        assert!(key.starts_with("mcp_"));
    }
}
