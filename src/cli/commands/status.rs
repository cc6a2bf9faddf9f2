//! Agent status command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::{build_service, display};
use crate::services::{AgentStatus, Config};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Agent to show; omit to list all known agents
    pub agent_id: Option<String>,

    /// Also show this many recent attempts
    #[arg(long, default_value_t = 0)]
    pub history: u32,
}

pub async fn execute(args: StatusArgs, json: bool) -> Result<()> {
    let config = Config::load()?;
    let service = build_service(&config).await?;

    let statuses: Vec<AgentStatus> = match &args.agent_id {
        Some(agent_id) => vec![service
            .get_agent_status(agent_id)
            .await
            .context("agent lookup failed")?],
        None => service.list_agent_statuses().await?,
    };

    if json {
        let payload: Vec<_> = statuses
            .iter()
            .map(|s| {
                serde_json::json!({
                    "agent_id": s.agent_id,
                    "difficulty": s.difficulty,
                    "complexity": s.complexity,
                    "threshold": s.threshold,
                    "level": s.level,
                    "xp": s.xp,
                    "consecutive_failures": s.consecutive_failures,
                    "consecutive_successes": s.consecutive_successes,
                    "total_attempts": s.total_attempts,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        if statuses.is_empty() {
            println!("No agents found.");
            return Ok(());
        }
        let mut table = display::list_table(&[
            "agent", "difficulty", "layers", "threshold", "level", "xp", "fails", "streak",
            "attempts",
        ]);
        for s in &statuses {
            table.add_row(vec![
                s.agent_id.clone(),
                s.difficulty.to_string(),
                s.complexity.layers().to_string(),
                s.threshold.to_string(),
                s.level.to_string(),
                s.xp.to_string(),
                s.consecutive_failures.to_string(),
                s.consecutive_successes.to_string(),
                s.total_attempts.to_string(),
            ]);
        }
        println!("{table}");
    }

    if args.history == 0 {
        return Ok(());
    }
    let Some(agent_id) = &args.agent_id else {
        return Ok(());
    };

    let attempts = service.recent_attempts(agent_id, args.history).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&attempts)?);
    } else {
        let mut table = display::list_table(&["when", "difficulty", "score", "outcome", "fallback"]);
        for a in &attempts {
            table.add_row(vec![
                a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                a.difficulty.to_string(),
                format!("{}/{}", a.score, a.threshold),
                a.outcome.to_string(),
                a.fallback_scored.to_string(),
            ]);
        }
        println!("{table}");
    }

    Ok(())
}
