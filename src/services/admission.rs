//! Budget-aware admission control.
//!
//! The single synchronization point in front of every provider invocation.
//! Checks run in a fixed order — cooldown, concurrency, hourly cap, daily
//! cap — and the first failing check wins. The concurrency permit is handed
//! back as an [`AdmissionSlot`] guard that releases on drop, so a panic,
//! timeout, or early return can never leak a slot.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::errors::DenyReason;
use crate::domain::models::provider::days_in_month;
use crate::domain::models::ProviderId;
use crate::services::budget_ledger::ProviderBudgetLedger;
use crate::services::config::RateLimitConfig;

/// Outcome of an admission request.
#[derive(Debug)]
pub enum AdmissionDecision {
    /// Admission granted; the slot must be held for the invocation's
    /// lifetime and is released when dropped.
    Allow(AdmissionSlot),
    /// Admission refused; the caller defers without penalizing the agent.
    Deny(DenyReason),
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// A held concurrency permit.
///
/// Releases exactly once: explicit [`release`](Self::release) calls after the
/// first, and the implicit release on drop, are no-ops.
#[derive(Debug)]
pub struct AdmissionSlot {
    active: Arc<AtomicU32>,
    released: AtomicBool,
}

impl AdmissionSlot {
    fn new(active: Arc<AtomicU32>) -> Self {
        Self {
            active,
            released: AtomicBool::new(false),
        }
    }

    /// Give the permit back. Idempotent.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// Admission controller guarding invocation concurrency and pacing.
pub struct AdmissionController {
    config: RateLimitConfig,
    ledger: Arc<ProviderBudgetLedger>,
    active: Arc<AtomicU32>,
    /// Last admission per agent seen by this process. The persisted
    /// `last_request_time` passed by the caller covers restarts; this map
    /// covers the window before that write lands.
    last_requests: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AdmissionController {
    pub fn new(config: RateLimitConfig, ledger: Arc<ProviderBudgetLedger>) -> Self {
        Self {
            config,
            ledger,
            active: Arc::new(AtomicU32::new(0)),
            last_requests: RwLock::new(HashMap::new()),
        }
    }

    /// Currently held slots.
    pub fn active_count(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    /// Rate-limit configuration, for the usage report.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether an invocation for `agent_id` against `provider` may
    /// proceed now.
    ///
    /// `persisted_last_request` is the agent record's stored admission time;
    /// `estimated_tokens` is advisory and logged for audit, not enforced.
    pub async fn request_admission(
        &self,
        agent_id: &str,
        persisted_last_request: Option<DateTime<Utc>>,
        provider: ProviderId,
        estimated_tokens: u32,
    ) -> AdmissionDecision {
        let now = Utc::now();

        // Check 1: per-agent cooldown.
        if let Some(reason) = self.cooldown_check(agent_id, persisted_last_request, now).await {
            debug!(agent_id, %reason, "Admission denied");
            return AdmissionDecision::Deny(reason);
        }

        // Check 2: global concurrency. The permit is reserved atomically here
        // and rolled back if a later check fails, so concurrent requests can
        // never over-admit between check and increment.
        let max = self.config.max_concurrent;
        if self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_err()
        {
            debug!(agent_id, "Admission denied: concurrency cap");
            return AdmissionDecision::Deny(DenyReason::Concurrency);
        }
        let slot = AdmissionSlot::new(self.active.clone());

        // Checks 3 and 4: provider spend caps.
        if let Some(reason) = self.budget_check(provider, now).await {
            warn!(agent_id, %provider, %reason, "Admission denied");
            // Slot rolls back via drop.
            return AdmissionDecision::Deny(reason);
        }

        self.last_requests
            .write()
            .await
            .insert(agent_id.to_string(), now);

        debug!(
            agent_id,
            %provider,
            estimated_tokens,
            active = self.active_count(),
            "Admission granted"
        );
        AdmissionDecision::Allow(slot)
    }

    async fn cooldown_check(
        &self,
        agent_id: &str,
        persisted: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DenyReason> {
        let in_process = self.last_requests.read().await.get(agent_id).copied();
        let last = match (in_process, persisted) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }?;

        let elapsed = (now - last).num_seconds();
        let cooldown = self.config.cooldown_secs as i64;
        if elapsed < cooldown {
            return Some(DenyReason::Cooldown {
                remaining_secs: (cooldown - elapsed).max(0) as u64,
            });
        }
        None
    }

    async fn budget_check(&self, provider: ProviderId, now: DateTime<Utc>) -> Option<DenyReason> {
        let day = now.date_naive();
        let hour = now.hour() as u8;
        let monthly_limit = self.ledger.monthly_limit(provider).await;

        let hourly_cap = (monthly_limit as f64 * self.config.max_hourly_fraction) as u64;
        let hourly = self.ledger.hourly_usage(provider, day, hour).await;
        if hourly >= hourly_cap.max(1) {
            return Some(DenyReason::HourlyCap);
        }

        let daily_cap = (monthly_limit as f64 * self.config.max_daily_fraction) as u64;
        let daily = self.ledger.daily_usage(provider, day).await;
        if daily >= daily_cap.max(1) {
            let monthly = self.ledger.monthly_usage(provider, day).await;
            if self.daily_cap_relaxed(day, monthly, monthly_limit) {
                debug!(%provider, daily, "Daily cap relaxed inside catch-up window");
            } else {
                return Some(DenyReason::DailyCap);
            }
        }

        None
    }

    /// Catch-up relaxation: inside the final days of the billing month, an
    /// under-spent budget (cumulative usage below the minimum daily average)
    /// unlocks the daily cap so unused quota is not silently wasted.
    fn daily_cap_relaxed(
        &self,
        day: chrono::NaiveDate,
        monthly_usage: u64,
        monthly_limit: u64,
    ) -> bool {
        if !self.config.catchup_enabled {
            return false;
        }
        if !catchup_window_active(day, self.config.catchup_window_days) {
            return false;
        }
        let expected_min =
            monthly_limit as f64 * self.config.min_daily_fraction * f64::from(day.day());
        (monthly_usage as f64) < expected_min
    }
}

/// Whether `day` falls in the final `window_days` days of its month.
pub fn catchup_window_active(day: chrono::NaiveDate, window_days: u32) -> bool {
    let total = days_in_month(day);
    day.day() > total.saturating_sub(window_days)
}
