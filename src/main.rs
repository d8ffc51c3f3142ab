//! Timeline Watcher CLI
//!
//! Watches a rendered social timeline and relays new replies and mentions to
//! the configured webhook endpoints.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use watcher::{
    error::Result, extract::Extractor, ledger::Ledger, models::Config, pipeline,
    settings::Settings,
};

/// Timeline Watcher - reply/mention webhook relay
#[derive(Parser, Debug)]
#[command(name = "watcher", version, about = "Timeline reply/mention webhook relay")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Directory holding the ledger and settings
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the timeline and relay new replies and mentions
    Watch,

    /// Validate configuration and selectors
    Validate,

    /// Toggle test mode (reprocess posts without dedup enforcement)
    TestMode {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Prune ledger records older than the retention window
    Prune {
        /// Override the configured retention in days
        #[arg(long)]
        days: Option<u64>,
    },

    /// Show ledger and settings state
    Info,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Watch => {
            log::info!("Timeline watcher starting...");
            pipeline::run(&config, &cli.data_dir).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            Extractor::new(
                &config.selectors,
                &config.watcher.account,
                &config.watcher.base_url,
            )?;
            log::info!("✓ Config OK (endpoints, timings, and selectors)");
        }

        Command::TestMode { state } => {
            let enabled = matches!(state, Toggle::On);
            Settings::new(&cli.data_dir).set_test_mode(enabled).await?;
            log::info!(
                "Test mode {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }

        Command::Prune { days } => {
            let ledger = Ledger::new(&cli.data_dir);
            ledger.open().await?;

            let days = days.unwrap_or(config.ledger.retention_days);
            let cutoff = chrono::Utc::now() - chrono::Duration::days(days as i64);

            let before = ledger.count().await;
            ledger.prune_older_than(cutoff).await;
            let after = ledger.count().await;

            log::info!(
                "Pruned {} record(s); {} remain",
                before.saturating_sub(after),
                after
            );
        }

        Command::Info => {
            let ledger = Ledger::new(&cli.data_dir);
            ledger.open().await?;

            log::info!("Data directory: {}", cli.data_dir.display());
            log::info!("Ledger records: {}", ledger.count().await);

            let test_mode = Settings::new(&cli.data_dir).test_mode().await;
            log::info!("Test mode: {}", if test_mode { "on" } else { "off" });
        }
    }

    Ok(())
}
