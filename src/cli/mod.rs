//! Command-line interface for the proctor engine.

pub mod commands;
pub mod display;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::adapters::providers::build_clients;
use crate::adapters::sqlite::{
    initialize_database, SqliteAgentRecordRepository, SqliteAttemptRepository,
    SqliteProviderUsageRepository,
};
use crate::domain::models::ProviderId;
use crate::services::{
    AdmissionController, AgentProgressionTracker, Config, ProviderBudgetLedger, ProviderRouter,
    TestCycleService, TestDifficultyEngine, TestScorer,
};

#[derive(Parser, Debug)]
#[command(name = "proctor", version, about = "Budget-governed test administration for learning agents")]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database
    Init(commands::init::InitArgs),
    /// Administer one test cycle to an agent
    Test(commands::test::TestArgs),
    /// Show agent progression status
    Status(commands::status::StatusArgs),
    /// Show provider usage distribution and governor state
    Usage(commands::usage::UsageArgs),
    /// Roll the budget ledger over at a month boundary
    ResetMonth(commands::usage::ResetMonthArgs),
}

/// Wire the full service stack from configuration.
///
/// Provider clients read their API keys from the environment; the ledger is
/// hydrated from durable storage so caps survive restarts.
pub async fn build_service(config: &Config) -> Result<TestCycleService> {
    let pool = initialize_database(&format!("sqlite:{}", config.database.path)).await?;

    let records: Arc<SqliteAgentRecordRepository> =
        Arc::new(SqliteAgentRecordRepository::new(pool.clone()));
    let attempts = Arc::new(SqliteAttemptRepository::new(pool.clone()));
    let usage = Arc::new(SqliteProviderUsageRepository::new(pool));

    let ledger = Arc::new(ProviderBudgetLedger::new(
        usage,
        &[
            (ProviderId::Primary, config.providers.primary.monthly_token_limit),
            (ProviderId::Secondary, config.providers.secondary.monthly_token_limit),
        ],
    ));
    ledger.hydrate().await?;

    let clients = build_clients(&config.providers)
        .map_err(|e| anyhow::anyhow!("provider setup failed: {e}"))?;
    let router = Arc::new(ProviderRouter::new(
        clients,
        ledger.clone(),
        config.providers.fallback_threshold,
        config.providers.invoke_timeout_secs,
    ));

    let admission = Arc::new(AdmissionController::new(
        config.rate_limit.clone(),
        ledger.clone(),
    ));
    let scorer = Arc::new(TestScorer::new(router.clone(), config.scoring.clone()));
    let tracker = Arc::new(AgentProgressionTracker::new(
        records.clone(),
        config.progression.clone(),
    ));
    let engine = TestDifficultyEngine::new(config.progression.promotion_streak);

    Ok(TestCycleService::new(
        admission,
        router,
        engine,
        scorer,
        tracker,
        records,
        attempts,
        ledger,
        config.providers.clone(),
    ))
}

/// Print an error the way the selected output mode expects, then exit.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": err.to_string() });
        eprintln!("{payload}");
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
