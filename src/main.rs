//! shellcache - offline shell cache agent
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use shellcache::cli::{Cli, Commands};
use shellcache::config::{Config, ConfigManager};
use shellcache::error::AgentResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("shellcache=warn"),
        1 => EnvFilter::new("shellcache=info"),
        _ => EnvFilter::new("shellcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

async fn run() -> AgentResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // The log format comes from the config, so load it before logging starts
    let config = config_manager.load().await?;
    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Install(args) => shellcache::cli::commands::install(args, &config).await,
        Commands::Activate => shellcache::cli::commands::activate(&config).await,
        Commands::Fetch(args) => shellcache::cli::commands::fetch(args, &config).await,
        Commands::Message(args) => shellcache::cli::commands::message(args, &config).await,
        Commands::Cache(args) => shellcache::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            shellcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
