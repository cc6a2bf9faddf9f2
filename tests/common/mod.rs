//! Common test utilities for integration tests.
//!
//! Builds a fully wired `TestCycleService` over an in-memory database and
//! scriptable mock providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use proctor::adapters::providers::MockProviderClient;
use proctor::adapters::sqlite::{
    create_migrated_test_pool, SqliteAgentRecordRepository, SqliteAttemptRepository,
    SqliteProviderUsageRepository,
};
use proctor::domain::models::ProviderId;
use proctor::domain::ports::ProviderClient;
use proctor::services::config::{ProgressionConfig, ProvidersConfig, ScoringConfig};
use proctor::services::{
    AdmissionController, AgentProgressionTracker, ProviderBudgetLedger, ProviderRouter,
    RateLimitConfig, TestCycleService, TestDifficultyEngine, TestScorer,
};

/// A wired service plus handles to its collaborators for assertions.
#[allow(dead_code)]
pub struct TestHarness {
    pub service: TestCycleService,
    pub ledger: Arc<ProviderBudgetLedger>,
    pub admission: Arc<AdmissionController>,
    pub records: Arc<SqliteAgentRecordRepository>,
    pub attempts: Arc<SqliteAttemptRepository>,
    pub tracker: Arc<AgentProgressionTracker>,
}

/// Rate-limit config with cooldown disabled, for multi-cycle tests.
#[allow(dead_code)]
pub fn no_cooldown_config() -> RateLimitConfig {
    RateLimitConfig {
        cooldown_secs: 0,
        ..RateLimitConfig::default()
    }
}

/// Build a harness with the given providers and rate limits.
///
/// Primary budget is 140k tokens/month, secondary 10k, mirroring defaults.
pub async fn build_harness(
    primary: MockProviderClient,
    secondary: MockProviderClient,
    rate_limit: RateLimitConfig,
) -> TestHarness {
    build_harness_with_limits(primary, secondary, rate_limit, 140_000, 10_000).await
}

#[allow(dead_code)]
pub async fn build_harness_with_limits(
    primary: MockProviderClient,
    secondary: MockProviderClient,
    rate_limit: RateLimitConfig,
    primary_limit: u64,
    secondary_limit: u64,
) -> TestHarness {
    let pool = create_migrated_test_pool().await.unwrap();

    let records = Arc::new(SqliteAgentRecordRepository::new(pool.clone()));
    let attempts = Arc::new(SqliteAttemptRepository::new(pool.clone()));
    let usage = Arc::new(SqliteProviderUsageRepository::new(pool));

    let ledger = Arc::new(ProviderBudgetLedger::new(
        usage,
        &[
            (ProviderId::Primary, primary_limit),
            (ProviderId::Secondary, secondary_limit),
        ],
    ));

    let mut clients: BTreeMap<ProviderId, Arc<dyn ProviderClient>> = BTreeMap::new();
    clients.insert(ProviderId::Primary, Arc::new(primary));
    clients.insert(ProviderId::Secondary, Arc::new(secondary));

    let providers_config = ProvidersConfig::default();
    let router = Arc::new(ProviderRouter::new(
        clients,
        ledger.clone(),
        providers_config.fallback_threshold,
        5,
    ));

    let admission = Arc::new(AdmissionController::new(rate_limit, ledger.clone()));
    let scorer = Arc::new(TestScorer::new(router.clone(), ScoringConfig::default()));
    let tracker = Arc::new(AgentProgressionTracker::new(
        records.clone(),
        ProgressionConfig::default(),
    ));
    let engine = TestDifficultyEngine::default();

    let service = TestCycleService::new(
        admission.clone(),
        router,
        engine,
        scorer,
        tracker.clone(),
        records.clone(),
        attempts.clone(),
        ledger.clone(),
        providers_config,
    );

    TestHarness {
        service,
        ledger,
        admission,
        records,
        attempts,
        tracker,
    }
}
