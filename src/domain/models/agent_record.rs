//! Persisted per-agent test state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::{AttemptOutcome, TestAttempt};

/// Persisted test state for one agent.
///
/// Owned exclusively by the progression tracker. The run-length counters are
/// a derived aggregate of the attempt log: replaying the ordered log from an
/// empty record reproduces them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTestRecord {
    /// Agent identifier.
    pub agent_id: String,

    /// Consecutive quality failures; reset to zero on any pass.
    pub consecutive_failures: u32,

    /// Consecutive passes; reset to zero on any quality failure.
    pub consecutive_successes: u32,

    /// Current level, starting at 1.
    pub level: u32,

    /// XP accumulated toward the next level.
    pub xp: u64,

    /// Lifetime attempt count, including provider-failure attempts.
    pub total_attempts: u64,

    /// When this agent last had an admission granted. Persisted so cooldown
    /// enforcement survives process restarts.
    pub last_request_time: Option<DateTime<Utc>>,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl AgentTestRecord {
    /// Create a fresh record for an agent's first test.
    pub fn new(agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            consecutive_failures: 0,
            consecutive_successes: 0,
            level: 1,
            xp: 0,
            total_attempts: 0,
            last_request_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one attempt's outcome into this record.
    ///
    /// Quality outcomes flip the run-length counters; provider failures leave
    /// them untouched so infrastructure trouble never demotes an agent. XP is
    /// awarded on a pass and levels roll over at `level_threshold`, carrying
    /// the remainder forward.
    pub fn apply_outcome(&mut self, attempt: &TestAttempt, level_threshold: u64) {
        self.total_attempts += 1;

        match attempt.outcome {
            AttemptOutcome::Passed => {
                self.consecutive_failures = 0;
                self.consecutive_successes += 1;
                self.xp += u64::from(attempt.score) * attempt.difficulty.xp_multiplier();
                while self.xp >= level_threshold {
                    self.xp -= level_threshold;
                    self.level += 1;
                }
            }
            AttemptOutcome::QualityFailure => {
                self.consecutive_successes = 0;
                self.consecutive_failures += 1;
            }
            AttemptOutcome::ProviderFailure => {}
        }

        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::difficulty::{ComplexityShape, Difficulty};
    use crate::domain::models::provider::ProviderId;

    fn attempt(outcome: AttemptOutcome, score: u32, difficulty: Difficulty) -> TestAttempt {
        TestAttempt::new(
            "guardian",
            difficulty,
            ComplexityShape::SingleLayer,
            70,
            Some(ProviderId::Primary),
            score,
            outcome,
            false,
        )
    }

    #[test]
    fn test_pass_resets_failures_and_awards_xp() {
        let mut record = AgentTestRecord::new("guardian");
        record.consecutive_failures = 4;

        record.apply_outcome(&attempt(AttemptOutcome::Passed, 80, Difficulty::Basic), 1000);

        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.consecutive_successes, 1);
        assert_eq!(record.xp, 80);
        assert_eq!(record.total_attempts, 1);
    }

    #[test]
    fn test_quality_failure_resets_successes() {
        let mut record = AgentTestRecord::new("guardian");
        record.consecutive_successes = 3;

        record.apply_outcome(
            &attempt(AttemptOutcome::QualityFailure, 40, Difficulty::Basic),
            1000,
        );

        assert_eq!(record.consecutive_successes, 0);
        assert_eq!(record.consecutive_failures, 1);
        assert_eq!(record.xp, 0);
    }

    #[test]
    fn test_provider_failure_leaves_counters_untouched() {
        let mut record = AgentTestRecord::new("guardian");
        record.consecutive_failures = 2;

        record.apply_outcome(
            &attempt(AttemptOutcome::ProviderFailure, 0, Difficulty::Basic),
            1000,
        );

        assert_eq!(record.consecutive_failures, 2);
        assert_eq!(record.consecutive_successes, 0);
        assert_eq!(record.total_attempts, 1);
    }

    #[test]
    fn test_level_up_carries_remainder() {
        let mut record = AgentTestRecord::new("guardian");
        record.xp = 950;

        // 90 * 2 = 180 XP -> 1130 total -> level 2 with 130 carried.
        record.apply_outcome(
            &attempt(AttemptOutcome::Passed, 90, Difficulty::Intermediate),
            1000,
        );

        assert_eq!(record.level, 2);
        assert_eq!(record.xp, 130);
    }

    #[test]
    fn test_counters_mutually_exclusive_after_outcomes() {
        let mut record = AgentTestRecord::new("guardian");

        record.apply_outcome(&attempt(AttemptOutcome::Passed, 75, Difficulty::Basic), 1000);
        assert!(record.consecutive_failures == 0 && record.consecutive_successes > 0);

        record.apply_outcome(
            &attempt(AttemptOutcome::QualityFailure, 30, Difficulty::Basic),
            1000,
        );
        assert!(record.consecutive_successes == 0 && record.consecutive_failures > 0);
    }
}
