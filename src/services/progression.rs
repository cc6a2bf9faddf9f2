//! Agent progression updates from completed attempts.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentTestRecord, TestAttempt};
use crate::domain::ports::AgentRecordRepository;
use crate::services::config::ProgressionConfig;

/// Applies attempt outcomes to persisted agent state, idempotently.
///
/// The repository write marks the attempt id applied in the same transaction
/// as the record update, so re-delivery of the same attempt is a no-op.
pub struct AgentProgressionTracker {
    records: Arc<dyn AgentRecordRepository>,
    config: ProgressionConfig,
}

impl AgentProgressionTracker {
    pub fn new(records: Arc<dyn AgentRecordRepository>, config: ProgressionConfig) -> Self {
        Self { records, config }
    }

    /// Fetch the agent's record, creating a fresh one on first contact.
    pub async fn get_or_create(&self, agent_id: &str) -> DomainResult<AgentTestRecord> {
        if let Some(record) = self.records.get(agent_id).await? {
            return Ok(record);
        }
        let record = AgentTestRecord::new(agent_id);
        self.records.create(&record).await?;
        debug!(agent_id, "Created fresh agent record");
        Ok(record)
    }

    /// Fold `attempt` into the agent's record and persist.
    ///
    /// Idempotent on `attempt.id`: if the id was already applied the stored
    /// record is returned unchanged.
    pub async fn apply_attempt(&self, attempt: &TestAttempt) -> DomainResult<AgentTestRecord> {
        let mut record = self.get_or_create(&attempt.agent_id).await?;
        let level_before = record.level;

        record.apply_outcome(attempt, self.config.level_threshold);

        let applied = self.records.store_applied(&record, attempt.id).await?;
        if !applied {
            debug!(attempt_id = %attempt.id, "Attempt already applied; no-op");
            let stored = self.records.get(&attempt.agent_id).await?;
            return Ok(stored.unwrap_or(record));
        }

        if record.level > level_before {
            info!(
                agent_id = %attempt.agent_id,
                level = record.level,
                "Agent leveled up"
            );
        }
        debug!(
            agent_id = %attempt.agent_id,
            outcome = %attempt.outcome,
            failures = record.consecutive_failures,
            successes = record.consecutive_successes,
            "Applied attempt"
        );
        Ok(record)
    }

    /// Replay an ordered attempt log onto an empty record.
    ///
    /// Used by audits: the result must match the persisted record exactly.
    pub fn replay(&self, agent_id: &str, attempts: &[TestAttempt]) -> AgentTestRecord {
        let mut record = AgentTestRecord::new(agent_id);
        for attempt in attempts {
            record.apply_outcome(attempt, self.config.level_threshold);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAgentRecordRepository};
    use crate::domain::models::{AttemptOutcome, ComplexityShape, Difficulty, ProviderId};

    async fn make_tracker() -> AgentProgressionTracker {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = Arc::new(SqliteAgentRecordRepository::new(pool));
        AgentProgressionTracker::new(repo, ProgressionConfig::default())
    }

    fn attempt(outcome: AttemptOutcome, score: u32) -> TestAttempt {
        TestAttempt::new(
            "sandbox",
            Difficulty::Basic,
            ComplexityShape::SingleLayer,
            70,
            Some(ProviderId::Primary),
            score,
            outcome,
            false,
        )
    }

    #[tokio::test]
    async fn test_apply_pass_then_failure() {
        let tracker = make_tracker().await;

        let record = tracker
            .apply_attempt(&attempt(AttemptOutcome::Passed, 80))
            .await
            .unwrap();
        assert_eq!(record.consecutive_successes, 1);
        assert_eq!(record.xp, 80);

        let record = tracker
            .apply_attempt(&attempt(AttemptOutcome::QualityFailure, 30))
            .await
            .unwrap();
        assert_eq!(record.consecutive_successes, 0);
        assert_eq!(record.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_apply_attempt_idempotent() {
        let tracker = make_tracker().await;
        let att = attempt(AttemptOutcome::Passed, 90);

        let first = tracker.apply_attempt(&att).await.unwrap();
        let second = tracker.apply_attempt(&att).await.unwrap();

        assert_eq!(first.xp, second.xp);
        assert_eq!(first.total_attempts, second.total_attempts);
        assert_eq!(second.consecutive_successes, 1);
    }

    #[tokio::test]
    async fn test_provider_failure_does_not_touch_counters() {
        let tracker = make_tracker().await;
        tracker
            .apply_attempt(&attempt(AttemptOutcome::QualityFailure, 20))
            .await
            .unwrap();

        let record = tracker
            .apply_attempt(&attempt(AttemptOutcome::ProviderFailure, 0))
            .await
            .unwrap();
        assert_eq!(record.consecutive_failures, 1);
        assert_eq!(record.total_attempts, 2);
    }

    #[tokio::test]
    async fn test_replay_matches_applied_state() {
        let tracker = make_tracker().await;
        let log = vec![
            attempt(AttemptOutcome::Passed, 75),
            attempt(AttemptOutcome::Passed, 95),
            attempt(AttemptOutcome::ProviderFailure, 0),
            attempt(AttemptOutcome::QualityFailure, 10),
        ];

        let mut persisted = None;
        for att in &log {
            persisted = Some(tracker.apply_attempt(att).await.unwrap());
        }
        let persisted = persisted.unwrap();

        let replayed = tracker.replay("sandbox", &log);
        assert_eq!(replayed.consecutive_failures, persisted.consecutive_failures);
        assert_eq!(replayed.consecutive_successes, persisted.consecutive_successes);
        assert_eq!(replayed.level, persisted.level);
        assert_eq!(replayed.xp, persisted.xp);
        assert_eq!(replayed.total_attempts, persisted.total_attempts);
    }
}
