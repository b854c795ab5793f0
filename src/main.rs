use clap::Parser;

use intelligent_discovery::cli::{self, Cli, Command};
use intelligent_discovery::infrastructure::logging;
use intelligent_discovery::{AppConfig, Subsystem};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let subsystem = Subsystem::initialize(config).await?;

    let result = match cli.command {
        Command::Status => cli::status::run(&subsystem).await,
        Command::Cache { command } => cli::cache::run(&subsystem, command).await,
        Command::Backup { command } => cli::backup::run(&subsystem, command).await,
    };

    subsystem.shutdown();
    result
}
