//! Port traits consumed by the service layer.

pub mod agent_record_repository;
pub mod attempt_repository;
pub mod provider_client;
pub mod provider_usage_repository;

pub use agent_record_repository::AgentRecordRepository;
pub use attempt_repository::AttemptRepository;
pub use provider_client::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse};
pub use provider_usage_repository::{ProviderUsageRepository, UsageBucket};
