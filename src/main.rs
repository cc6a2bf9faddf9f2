//! Proctor CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proctor::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => proctor::cli::commands::init::execute(args, cli.json).await,
        Commands::Test(args) => proctor::cli::commands::test::execute(args, cli.json).await,
        Commands::Status(args) => proctor::cli::commands::status::execute(args, cli.json).await,
        Commands::Usage(args) => proctor::cli::commands::usage::execute(args, cli.json).await,
        Commands::ResetMonth(args) => {
            proctor::cli::commands::usage::execute_reset(args, cli.json).await
        }
    };

    if let Err(err) = result {
        proctor::cli::handle_error(err, cli.json);
    }
}
