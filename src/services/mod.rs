//! Service layer: the governed test-administration engine.

pub mod admission;
pub mod budget_ledger;
pub mod config;
pub mod difficulty_engine;
pub mod progression;
pub mod provider_router;
pub mod scorer;
pub mod test_cycle;

pub use admission::{AdmissionController, AdmissionDecision, AdmissionSlot};
pub use budget_ledger::{ProviderBudgetLedger, ProviderUsageSnapshot};
pub use config::{Config, ConfigError, RateLimitConfig};
pub use difficulty_engine::{DifficultyAssessment, TestDifficultyEngine};
pub use progression::AgentProgressionTracker;
pub use provider_router::{InvocationOutcome, ProviderRouter};
pub use scorer::{ScoreResult, TestScorer};
pub use test_cycle::{AgentStatus, TestCycleService, UsageDistribution};
