//! Usage distribution and ledger maintenance commands.

use anyhow::Result;
use clap::Args;

use crate::cli::{build_service, display};
use crate::services::Config;

#[derive(Args, Debug)]
pub struct UsageArgs {}

#[derive(Args, Debug)]
pub struct ResetMonthArgs {}

pub async fn execute(_args: UsageArgs, json: bool) -> Result<()> {
    let config = Config::load()?;
    let service = build_service(&config).await?;
    let distribution = service.get_usage_distribution().await;

    if json {
        let payload = serde_json::json!({
            "providers": distribution.providers.iter().map(|p| {
                serde_json::json!({
                    "provider": p.provider,
                    "monthly_limit": p.monthly_limit,
                    "monthly_tokens": p.monthly_tokens,
                    "daily_tokens": p.daily_tokens,
                    "hourly_tokens": p.hourly_tokens,
                    "usage_fraction": p.usage_fraction,
                    "remaining_tokens": p.monthly_limit.saturating_sub(p.monthly_tokens),
                })
            }).collect::<Vec<_>>(),
            "active_concurrency": distribution.active_concurrency,
            "rate_limit": {
                "cooldown_secs": distribution.rate_limit.cooldown_secs,
                "max_concurrent": distribution.rate_limit.max_concurrent,
                "max_hourly_fraction": distribution.rate_limit.max_hourly_fraction,
                "max_daily_fraction": distribution.rate_limit.max_daily_fraction,
                "min_daily_fraction": distribution.rate_limit.min_daily_fraction,
                "catchup_window_days": distribution.rate_limit.catchup_window_days,
                "catchup_enabled": distribution.rate_limit.catchup_enabled,
            },
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let mut table =
        display::list_table(&["provider", "month", "today", "this hour", "limit", "used"]);
    for p in &distribution.providers {
        table.add_row(vec![
            p.provider.to_string(),
            p.monthly_tokens.to_string(),
            p.daily_tokens.to_string(),
            p.hourly_tokens.to_string(),
            p.monthly_limit.to_string(),
            display::percent(p.usage_fraction),
        ]);
    }
    println!("{table}");
    println!(
        "active concurrency: {}/{} | cooldown: {}s | daily cap: {} | hourly cap: {}",
        distribution.active_concurrency,
        distribution.rate_limit.max_concurrent,
        distribution.rate_limit.cooldown_secs,
        display::percent(distribution.rate_limit.max_daily_fraction),
        display::percent(distribution.rate_limit.max_hourly_fraction),
    );
    Ok(())
}

pub async fn execute_reset(_args: ResetMonthArgs, json: bool) -> Result<()> {
    let config = Config::load()?;
    let service = build_service(&config).await?;
    service.reset_monthly().await?;

    if json {
        println!("{}", serde_json::json!({ "reset": true }));
    } else {
        println!("Monthly ledger roll-over complete.");
    }
    Ok(())
}
