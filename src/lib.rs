//! Proctor - Budget-Governed Test Administration
//!
//! Proctor administers autonomous test cycles to learning agents under a
//! strict, shared, multi-provider token budget. Every evaluation request
//! passes a budget-aware admission governor before it may invoke a provider,
//! and every completed attempt feeds an adaptive difficulty and scoring
//! engine that derives thresholds purely from historical performance.
//!
//! # Architecture
//!
//! The crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure models, port traits, and error types
//! - **Service Layer** (`services`): Admission, routing, scoring, progression
//! - **Adapters Layer** (`adapters`): SQLite persistence and provider clients
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use proctor::cli::build_service;
//! use proctor::services::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = build_service(&Config::load()?).await?;
//!     let result = service.administer_test("guardian").await?;
//!     println!("score: {}", result.score);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DenyReason, DomainError, DomainResult};
pub use domain::models::{
    AgentTestRecord, AttemptOutcome, ComplexityShape, Difficulty, ProviderId, TestAttempt,
    TestAttemptResult,
};
pub use domain::ports::{
    AgentRecordRepository, AttemptRepository, ProviderClient, ProviderError, ProviderRequest,
    ProviderResponse, ProviderUsageRepository,
};
pub use services::{
    AdmissionController, AdmissionDecision, AgentProgressionTracker, Config, ConfigError,
    ProviderBudgetLedger, ProviderRouter, TestCycleService, TestDifficultyEngine, TestScorer,
};
