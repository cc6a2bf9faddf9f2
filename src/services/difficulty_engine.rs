//! Failure-history-driven difficulty assessment.
//!
//! Difficulty is never stored: every cycle recomputes it from the agent's
//! run-length counters, so a restart or a replay of the attempt log lands on
//! identical behavior. The engine is a pure function of its inputs.

use crate::domain::models::{ComplexityShape, Difficulty};

/// Computed difficulty plus complexity shape for one test cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyAssessment {
    pub difficulty: Difficulty,
    pub complexity: ComplexityShape,
}

/// Stateless difficulty engine.
#[derive(Debug, Clone)]
pub struct TestDifficultyEngine {
    /// Consecutive successes required for a one-step promotion.
    promotion_streak: u32,
}

impl TestDifficultyEngine {
    pub fn new(promotion_streak: u32) -> Self {
        Self { promotion_streak }
    }

    /// Base difficulty implied by an agent's level, before history adjustment.
    pub fn base_difficulty_for_level(level: u32) -> Difficulty {
        match level {
            0..=3 => Difficulty::Basic,
            4..=6 => Difficulty::Intermediate,
            7..=9 => Difficulty::Advanced,
            10..=12 => Difficulty::Expert,
            _ => Difficulty::Master,
        }
    }

    /// Compute the effective difficulty and complexity for a cycle.
    ///
    /// Rules in priority order: a deep failure streak forces `Basic`; a short
    /// one demotes a single step; a clean promotion streak climbs a single
    /// step (capped at `Master`); anything else leaves the base untouched.
    /// Five or more consecutive failures independently force a single-layer
    /// test regardless of the difficulty decided above.
    pub fn assess(
        &self,
        consecutive_failures: u32,
        consecutive_successes: u32,
        base: Difficulty,
    ) -> DifficultyAssessment {
        let difficulty = match consecutive_failures {
            10.. => Difficulty::Basic,
            5..=9 => Difficulty::Basic,
            3..=4 => Difficulty::Basic,
            1..=2 => base.demoted(),
            0 => {
                if consecutive_successes >= self.promotion_streak {
                    base.promoted()
                } else {
                    base
                }
            }
        };

        let complexity = if consecutive_failures >= 5 {
            ComplexityShape::SingleLayer
        } else {
            Self::layering_for(difficulty)
        };

        DifficultyAssessment {
            difficulty,
            complexity,
        }
    }

    /// Default layering by difficulty tier.
    fn layering_for(difficulty: Difficulty) -> ComplexityShape {
        match difficulty {
            Difficulty::Basic | Difficulty::Intermediate => ComplexityShape::SingleLayer,
            Difficulty::Advanced | Difficulty::Expert => ComplexityShape::DualLayer,
            Difficulty::Master => ComplexityShape::TriLayer,
        }
    }
}

impl Default for TestDifficultyEngine {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_failure_streaks_force_basic() {
        let engine = TestDifficultyEngine::default();
        for failures in [3, 4, 5, 7, 9, 10, 25] {
            let assessment = engine.assess(failures, 0, Difficulty::Master);
            assert_eq!(assessment.difficulty, Difficulty::Basic, "failures={failures}");
        }
    }

    #[test]
    fn test_short_failure_streak_demotes_one() {
        let engine = TestDifficultyEngine::default();
        assert_eq!(
            engine.assess(1, 0, Difficulty::Advanced).difficulty,
            Difficulty::Intermediate
        );
        assert_eq!(
            engine.assess(2, 0, Difficulty::Basic).difficulty,
            Difficulty::Basic
        );
    }

    #[test]
    fn test_promotion_requires_streak() {
        let engine = TestDifficultyEngine::default();
        assert_eq!(
            engine.assess(0, 2, Difficulty::Intermediate).difficulty,
            Difficulty::Intermediate
        );
        assert_eq!(
            engine.assess(0, 3, Difficulty::Intermediate).difficulty,
            Difficulty::Advanced
        );
    }

    #[test]
    fn test_promotion_caps_at_master() {
        let engine = TestDifficultyEngine::default();
        assert_eq!(
            engine.assess(0, 12, Difficulty::Master).difficulty,
            Difficulty::Master
        );
    }

    #[test]
    fn test_five_failures_force_single_layer() {
        let engine = TestDifficultyEngine::default();
        let assessment = engine.assess(7, 0, Difficulty::Master);
        assert_eq!(assessment.difficulty, Difficulty::Basic);
        assert_eq!(assessment.complexity, ComplexityShape::SingleLayer);
    }

    #[test]
    fn test_layering_scales_with_difficulty() {
        let engine = TestDifficultyEngine::default();
        assert_eq!(
            engine.assess(0, 0, Difficulty::Master).complexity,
            ComplexityShape::TriLayer
        );
        assert_eq!(
            engine.assess(0, 0, Difficulty::Advanced).complexity,
            ComplexityShape::DualLayer
        );
        assert_eq!(
            engine.assess(0, 0, Difficulty::Basic).complexity,
            ComplexityShape::SingleLayer
        );
    }

    #[test]
    fn test_pure_function_same_inputs_same_outputs() {
        let engine = TestDifficultyEngine::default();
        for failures in 0..12 {
            for successes in 0..6 {
                for base in Difficulty::ALL {
                    let a = engine.assess(failures, successes, base);
                    let b = engine.assess(failures, successes, base);
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn test_base_difficulty_for_level() {
        assert_eq!(
            TestDifficultyEngine::base_difficulty_for_level(1),
            Difficulty::Basic
        );
        assert_eq!(
            TestDifficultyEngine::base_difficulty_for_level(5),
            Difficulty::Intermediate
        );
        assert_eq!(
            TestDifficultyEngine::base_difficulty_for_level(8),
            Difficulty::Advanced
        );
        assert_eq!(
            TestDifficultyEngine::base_difficulty_for_level(11),
            Difficulty::Expert
        );
        assert_eq!(
            TestDifficultyEngine::base_difficulty_for_level(20),
            Difficulty::Master
        );
    }
}
