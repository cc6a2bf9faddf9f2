//! Database initialization command.

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::sqlite::initialize_database;
use crate::services::Config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Database path override
    #[arg(long)]
    pub database: Option<String>,
}

pub async fn execute(args: InitArgs, json: bool) -> Result<()> {
    let config = Config::load()?;
    let path = args.database.unwrap_or(config.database.path);

    initialize_database(&format!("sqlite:{path}"))
        .await
        .context("failed to initialize database")?;

    if json {
        println!("{}", serde_json::json!({ "initialized": path }));
    } else {
        println!("Initialized proctor database at {path}");
    }
    Ok(())
}
