//! Per-provider token budget bookkeeping.
//!
//! Tracks consumption at monthly/daily/hourly granularity for each configured
//! provider slot. Pure bookkeeping: the ledger never rejects a write — cap
//! enforcement lives in the admission controller and routing decisions in the
//! router, both of which only read from here.

use chrono::{NaiveDate, Timelike, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::provider::{first_of_prior_month, period_label, today_utc};
use crate::domain::models::{ProviderAccount, ProviderId};
use crate::domain::ports::ProviderUsageRepository;

/// Point-in-time usage snapshot for one provider, used by reporting.
#[derive(Debug, Clone)]
pub struct ProviderUsageSnapshot {
    pub provider: ProviderId,
    pub monthly_limit: u64,
    pub monthly_tokens: u64,
    pub daily_tokens: u64,
    pub hourly_tokens: u64,
    pub usage_fraction: f64,
}

struct Inner {
    accounts: BTreeMap<ProviderId, ProviderAccount>,
    /// Billing period the last `reset_monthly` ran for, e.g. `"2026-08"`.
    last_reset_period: Option<String>,
}

/// Central token-consumption ledger, write-through to durable storage.
pub struct ProviderBudgetLedger {
    repository: Arc<dyn ProviderUsageRepository>,
    inner: Arc<RwLock<Inner>>,
}

impl ProviderBudgetLedger {
    /// Create an empty ledger with the configured monthly limits.
    pub fn new(
        repository: Arc<dyn ProviderUsageRepository>,
        limits: &[(ProviderId, u64)],
    ) -> Self {
        let accounts = limits
            .iter()
            .map(|(provider, limit)| (*provider, ProviderAccount::new(*provider, *limit)))
            .collect();
        Self {
            repository,
            inner: Arc::new(RwLock::new(Inner {
                accounts,
                last_reset_period: None,
            })),
        }
    }

    /// Hydrate in-memory buckets from durable storage. Call once at startup.
    pub async fn hydrate(&self) -> DomainResult<()> {
        let buckets = self.repository.fetch_all().await?;
        let mut inner = self.inner.write().await;
        let count = buckets.len();
        for bucket in buckets {
            if let Some(account) = inner.accounts.get_mut(&bucket.provider) {
                account.add(bucket.day, bucket.hour, bucket.tokens);
            }
        }
        debug!(buckets = count, "Hydrated budget ledger from storage");
        Ok(())
    }

    /// Record actual tokens consumed by one invocation.
    ///
    /// Increments the in-memory bucket and writes through to the repository.
    /// Never rejects: this is bookkeeping, not policy.
    pub async fn record_usage(&self, provider: ProviderId, tokens: u64) -> DomainResult<()> {
        let now = Utc::now();
        let day = now.date_naive();
        let hour = now.hour() as u8;

        {
            let mut inner = self.inner.write().await;
            if let Some(account) = inner.accounts.get_mut(&provider) {
                account.add(day, hour, tokens);
            }
        }

        self.repository.add_usage(provider, day, hour, tokens).await?;
        debug!(%provider, tokens, "Recorded provider usage");
        Ok(())
    }

    /// Fraction of the monthly limit consumed this month, in `[0, 1]`.
    pub async fn usage_fraction(&self, provider: ProviderId) -> f64 {
        let inner = self.inner.read().await;
        inner
            .accounts
            .get(&provider)
            .map_or(1.0, |a| a.usage_fraction(today_utc()))
    }

    /// Tokens used by `provider` on `day`.
    pub async fn daily_usage(&self, provider: ProviderId, day: NaiveDate) -> u64 {
        let inner = self.inner.read().await;
        inner.accounts.get(&provider).map_or(0, |a| a.daily_usage(day))
    }

    /// Tokens used by `provider` during `hour` of `day`.
    pub async fn hourly_usage(&self, provider: ProviderId, day: NaiveDate, hour: u8) -> u64 {
        let inner = self.inner.read().await;
        inner
            .accounts
            .get(&provider)
            .map_or(0, |a| a.hourly_usage(day, hour))
    }

    /// Tokens used by `provider` in the month containing `day`.
    pub async fn monthly_usage(&self, provider: ProviderId, day: NaiveDate) -> u64 {
        let inner = self.inner.read().await;
        inner
            .accounts
            .get(&provider)
            .map_or(0, |a| a.monthly_usage(day))
    }

    /// Configured monthly limit for `provider`.
    pub async fn monthly_limit(&self, provider: ProviderId) -> u64 {
        let inner = self.inner.read().await;
        inner.accounts.get(&provider).map_or(0, |a| a.monthly_limit)
    }

    /// Roll the ledger over at a month boundary.
    ///
    /// Buckets are keyed by date, so the new month starts at zero without any
    /// explicit zeroing; the roll-over prunes buckets past the retention
    /// window (current + prior month) in memory and storage. Idempotent:
    /// calling twice in the same period is a no-op the second time.
    pub async fn reset_monthly(&self) -> DomainResult<()> {
        let today = today_utc();
        let period = period_label(today);

        {
            let mut inner = self.inner.write().await;
            if inner.last_reset_period.as_deref() == Some(period.as_str()) {
                debug!(%period, "Monthly reset already ran this period");
                return Ok(());
            }
            for account in inner.accounts.values_mut() {
                account.prune(today);
            }
            inner.last_reset_period = Some(period.clone());
        }

        let pruned = self
            .repository
            .prune_before(first_of_prior_month(today))
            .await?;
        info!(%period, pruned, "Monthly ledger roll-over complete");
        Ok(())
    }

    /// Usage snapshot for every configured provider, for reporting.
    pub async fn snapshot(&self) -> Vec<ProviderUsageSnapshot> {
        let now = Utc::now();
        let day = now.date_naive();
        let hour = now.hour() as u8;

        let inner = self.inner.read().await;
        inner
            .accounts
            .values()
            .map(|account| ProviderUsageSnapshot {
                provider: account.provider,
                monthly_limit: account.monthly_limit,
                monthly_tokens: account.monthly_usage(day),
                daily_tokens: account.daily_usage(day),
                hourly_tokens: account.hourly_usage(day, hour),
                usage_fraction: account.usage_fraction(day),
            })
            .collect()
    }
}
