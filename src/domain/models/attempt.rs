//! Immutable test attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::difficulty::{ComplexityShape, Difficulty};
use super::provider::ProviderId;

/// How an attempt ended.
///
/// `ProviderFailure` is an infrastructure outcome, not a verdict on the
/// agent: it never feeds the failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Passed,
    QualityFailure,
    ProviderFailure,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::QualityFailure => "quality_failure",
            Self::ProviderFailure => "provider_failure",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttemptOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passed" => Ok(Self::Passed),
            "quality_failure" => Ok(Self::QualityFailure),
            "provider_failure" => Ok(Self::ProviderFailure),
            _ => Err(anyhow::anyhow!("Invalid attempt outcome: {s}")),
        }
    }
}

/// One administered test, append-only.
///
/// Never mutated after creation: the attempt log is both the audit trail and
/// the sole input for recomputing agent counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAttempt {
    /// Unique attempt identifier; idempotence key for progression updates.
    pub id: Uuid,

    /// Agent that took the test.
    pub agent_id: String,

    /// Difficulty computed for this cycle.
    pub difficulty: Difficulty,

    /// Complexity shape computed for this cycle.
    pub complexity: ComplexityShape,

    /// Pass threshold in effect for this cycle.
    pub threshold: u32,

    /// Provider that served the generation invocation, if any succeeded.
    pub provider: Option<ProviderId>,

    /// Score in 0..=100.
    pub score: u32,

    /// How the attempt ended.
    pub outcome: AttemptOutcome,

    /// Whether the deterministic fallback scorer produced the score (or the
    /// attempt never reached provider grading at all).
    pub fallback_scored: bool,

    /// Creation timestamp; orders the per-agent log.
    pub created_at: DateTime<Utc>,
}

impl TestAttempt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: impl Into<String>,
        difficulty: Difficulty,
        complexity: ComplexityShape,
        threshold: u32,
        provider: Option<ProviderId>,
        score: u32,
        outcome: AttemptOutcome,
        fallback_scored: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            difficulty,
            complexity,
            threshold,
            provider,
            score,
            outcome,
            fallback_scored,
            created_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == AttemptOutcome::Passed
    }
}

/// The result surface returned to callers of `administer_test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAttemptResult {
    pub attempt_id: Uuid,
    pub agent_id: String,
    pub difficulty: Difficulty,
    pub complexity: ComplexityShape,
    pub threshold: u32,
    pub score: u32,
    pub passed: bool,
    pub outcome: AttemptOutcome,
    pub provider: Option<ProviderId>,
    pub fallback_scored: bool,
    pub level: u32,
    pub xp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [
            AttemptOutcome::Passed,
            AttemptOutcome::QualityFailure,
            AttemptOutcome::ProviderFailure,
        ] {
            assert_eq!(outcome.as_str().parse::<AttemptOutcome>().unwrap(), outcome);
        }
    }

    #[test]
    fn test_attempt_ids_unique() {
        let a = TestAttempt::new(
            "imperium",
            Difficulty::Basic,
            ComplexityShape::SingleLayer,
            70,
            None,
            0,
            AttemptOutcome::ProviderFailure,
            true,
        );
        let b = TestAttempt::new(
            "imperium",
            Difficulty::Basic,
            ComplexityShape::SingleLayer,
            70,
            None,
            0,
            AttemptOutcome::ProviderFailure,
            true,
        );
        assert_ne!(a.id, b.id);
    }
}
