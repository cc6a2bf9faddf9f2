//! Test cycle orchestration.
//!
//! Wires the governor and the scoring engine into the `administer_test`
//! operation: difficulty assessment, admission, governed invocation, scoring,
//! and progression update, in that order. Provider I/O runs while the
//! admission slot is held but outside any lock; the slot itself is released
//! on every exit path by its drop guard.

use backoff::ExponentialBackoff;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentTestRecord, AttemptOutcome, ComplexityShape, Difficulty, TestAttempt, TestAttemptResult,
};
use crate::domain::ports::{AgentRecordRepository, AttemptRepository};
use crate::services::admission::{AdmissionController, AdmissionDecision};
use crate::services::budget_ledger::{ProviderBudgetLedger, ProviderUsageSnapshot};
use crate::services::config::{ProvidersConfig, RateLimitConfig};
use crate::services::difficulty_engine::TestDifficultyEngine;
use crate::services::progression::AgentProgressionTracker;
use crate::services::provider_router::ProviderRouter;
use crate::services::scorer::TestScorer;

/// Read-only status surface for one agent.
#[derive(Debug, Clone)]
pub struct AgentStatus {
    pub agent_id: String,
    pub difficulty: Difficulty,
    pub complexity: ComplexityShape,
    pub threshold: u32,
    pub level: u32,
    pub xp: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_attempts: u64,
}

/// Usage report across providers plus live governor state.
#[derive(Debug, Clone)]
pub struct UsageDistribution {
    pub providers: Vec<ProviderUsageSnapshot>,
    pub active_concurrency: u32,
    pub rate_limit: RateLimitConfig,
}

/// The engine's exposed operation surface.
pub struct TestCycleService {
    admission: Arc<AdmissionController>,
    router: Arc<ProviderRouter>,
    engine: TestDifficultyEngine,
    scorer: Arc<TestScorer>,
    tracker: Arc<AgentProgressionTracker>,
    records: Arc<dyn AgentRecordRepository>,
    attempts: Arc<dyn AttemptRepository>,
    ledger: Arc<ProviderBudgetLedger>,
    providers_config: ProvidersConfig,
}

impl TestCycleService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        admission: Arc<AdmissionController>,
        router: Arc<ProviderRouter>,
        engine: TestDifficultyEngine,
        scorer: Arc<TestScorer>,
        tracker: Arc<AgentProgressionTracker>,
        records: Arc<dyn AgentRecordRepository>,
        attempts: Arc<dyn AttemptRepository>,
        ledger: Arc<ProviderBudgetLedger>,
        providers_config: ProvidersConfig,
    ) -> Self {
        Self {
            admission,
            router,
            engine,
            scorer,
            tracker,
            records,
            attempts,
            ledger,
            providers_config,
        }
    }

    /// Administer one governed test cycle to `agent_id`.
    ///
    /// Admission denials surface as [`DomainError::AdmissionDenied`] without
    /// touching the agent's counters; provider exhaustion completes the cycle
    /// as a provider-failure attempt.
    pub async fn administer_test(&self, agent_id: &str) -> DomainResult<TestAttemptResult> {
        let record = retry_persistence(|| self.tracker.get_or_create(agent_id)).await?;

        let base = TestDifficultyEngine::base_difficulty_for_level(record.level);
        let assessment = self.engine.assess(
            record.consecutive_failures,
            record.consecutive_successes,
            base,
        );
        let threshold = self
            .scorer
            .threshold_for(assessment.difficulty, record.consecutive_failures);

        let target = self.router.preferred_provider().await;
        let estimated = self.providers_config.estimated_tokens_per_test;

        let slot = match self
            .admission
            .request_admission(agent_id, record.last_request_time, target, estimated)
            .await
        {
            AdmissionDecision::Allow(slot) => slot,
            AdmissionDecision::Deny(reason) => {
                return Err(DomainError::AdmissionDenied { reason });
            }
        };

        let now = Utc::now();
        retry_persistence(|| self.records.touch_last_request(agent_id, now)).await?;

        info!(
            agent_id,
            difficulty = %assessment.difficulty,
            complexity = %assessment.complexity,
            threshold,
            "Administering test"
        );

        let question = build_test_prompt(agent_id, assessment.difficulty, assessment.complexity);

        // The generation invocation: the long-latency step, performed while
        // the slot is held but no lock is.
        let attempt = match self.router.invoke(&question, estimated).await {
            Ok(outcome) => {
                let graded = self
                    .scorer
                    .score(
                        &question,
                        &outcome.text,
                        assessment.difficulty,
                        record.consecutive_failures,
                    )
                    .await;
                TestAttempt::new(
                    agent_id,
                    assessment.difficulty,
                    assessment.complexity,
                    threshold,
                    Some(outcome.provider),
                    graded.score,
                    if graded.passed {
                        AttemptOutcome::Passed
                    } else {
                        AttemptOutcome::QualityFailure
                    },
                    graded.fallback,
                )
            }
            Err(DomainError::AllProvidersExhausted) => {
                warn!(agent_id, "All providers exhausted; recording provider failure");
                TestAttempt::new(
                    agent_id,
                    assessment.difficulty,
                    assessment.complexity,
                    threshold,
                    None,
                    0,
                    AttemptOutcome::ProviderFailure,
                    true,
                )
            }
            Err(other) => return Err(other),
        };

        // Invocation and grading are done; give the permit back before the
        // bookkeeping writes.
        drop(slot);

        retry_persistence(|| self.attempts.insert(&attempt)).await?;
        let updated = retry_persistence(|| self.tracker.apply_attempt(&attempt)).await?;

        info!(
            agent_id,
            outcome = %attempt.outcome,
            score = attempt.score,
            fallback = attempt.fallback_scored,
            "Test cycle complete"
        );

        Ok(TestAttemptResult {
            attempt_id: attempt.id,
            agent_id: agent_id.to_string(),
            difficulty: attempt.difficulty,
            complexity: attempt.complexity,
            threshold: attempt.threshold,
            score: attempt.score,
            passed: attempt.passed(),
            outcome: attempt.outcome,
            provider: attempt.provider,
            fallback_scored: attempt.fallback_scored,
            level: updated.level,
            xp: updated.xp,
        })
    }

    /// Current status for one agent, difficulty recomputed fresh.
    pub async fn get_agent_status(&self, agent_id: &str) -> DomainResult<AgentStatus> {
        let record = self
            .records
            .get(agent_id)
            .await?
            .ok_or_else(|| DomainError::AgentNotFound(agent_id.to_string()))?;
        Ok(self.status_from_record(&record))
    }

    /// Status for every known agent.
    pub async fn list_agent_statuses(&self) -> DomainResult<Vec<AgentStatus>> {
        let mut statuses = Vec::new();
        for agent_id in self.records.list_agent_ids().await? {
            if let Some(record) = self.records.get(&agent_id).await? {
                statuses.push(self.status_from_record(&record));
            }
        }
        Ok(statuses)
    }

    /// Per-provider usage plus live governor state.
    pub async fn get_usage_distribution(&self) -> UsageDistribution {
        UsageDistribution {
            providers: self.ledger.snapshot().await,
            active_concurrency: self.admission.active_count(),
            rate_limit: self.admission.config().clone(),
        }
    }

    /// An agent's recent attempt history, newest first.
    pub async fn recent_attempts(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> DomainResult<Vec<TestAttempt>> {
        self.attempts.recent_for_agent(agent_id, limit).await
    }

    /// Roll the ledger over at a month boundary. Idempotent.
    pub async fn reset_monthly(&self) -> DomainResult<()> {
        self.ledger.reset_monthly().await
    }

    fn status_from_record(&self, record: &AgentTestRecord) -> AgentStatus {
        let base = TestDifficultyEngine::base_difficulty_for_level(record.level);
        let assessment = self.engine.assess(
            record.consecutive_failures,
            record.consecutive_successes,
            base,
        );
        AgentStatus {
            agent_id: record.agent_id.clone(),
            difficulty: assessment.difficulty,
            complexity: assessment.complexity,
            threshold: self
                .scorer
                .threshold_for(assessment.difficulty, record.consecutive_failures),
            level: record.level,
            xp: record.xp,
            consecutive_failures: record.consecutive_failures,
            consecutive_successes: record.consecutive_successes,
            total_attempts: record.total_attempts,
        }
    }
}

/// Build the generation prompt for one test cycle.
fn build_test_prompt(agent_id: &str, difficulty: Difficulty, complexity: ComplexityShape) -> String {
    format!(
        "You are taking a {difficulty} proficiency assessment as agent '{agent_id}'.\n\
         Construct and solve a {layers}-layer scenario appropriate to that tier.\n\
         Show your reasoning and a concrete final answer.",
        layers = complexity.layers()
    )
}

/// Retry persistence-class failures with bounded exponential backoff.
///
/// Anything other than [`DomainError::PersistenceError`] is permanent and
/// surfaces immediately.
async fn retry_persistence<T, Fut, F>(mut op: F) -> DomainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_elapsed_time: Some(Duration::from_secs(2)),
        ..ExponentialBackoff::default()
    };
    backoff::future::retry(policy, || {
        let fut = op();
        async move {
            fut.await.map_err(|err| match err {
                DomainError::PersistenceError(_) => backoff::Error::transient(err),
                other => backoff::Error::permanent(other),
            })
        }
    })
    .await
}
