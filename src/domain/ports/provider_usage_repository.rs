//! Persistence port for provider usage buckets.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::errors::DomainResult;
use crate::domain::models::ProviderId;

/// One persisted hourly bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageBucket {
    pub provider: ProviderId,
    pub day: NaiveDate,
    pub hour: u8,
    pub tokens: u64,
}

/// Durable storage for the budget ledger's hourly buckets.
#[async_trait]
pub trait ProviderUsageRepository: Send + Sync {
    /// Add tokens to one bucket, creating it if absent.
    async fn add_usage(
        &self,
        provider: ProviderId,
        day: NaiveDate,
        hour: u8,
        tokens: u64,
    ) -> DomainResult<()>;

    /// All retained buckets, for ledger hydration at startup.
    async fn fetch_all(&self) -> DomainResult<Vec<UsageBucket>>;

    /// Delete buckets strictly before `cutoff`. Returns rows removed.
    async fn prune_before(&self, cutoff: NaiveDate) -> DomainResult<u64>;
}
