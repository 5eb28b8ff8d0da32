mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use smartroom_client_rs::{
    DEFAULT_POLL_INTERVAL, LIGHT_STATUS_PATH, LogConfig, LogGuard, init_console_logging,
    init_file_logging,
};

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Read the light state once and print it
    Status {
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll the store and print every visible change
    Listen,
    /// Flip the light and wait for the store to confirm
    Toggle,
}

#[derive(Parser, Debug)]
struct Params {
    /// Base URL of the cloud document store
    #[arg(long, env = "SMARTROOM_DB_URL")]
    db_url: String,
    /// Auth secret appended to every request
    #[arg(long, env = "SMARTROOM_DB_SECRET", hide_env_values = true)]
    db_secret: String,
    /// Document path of the light fixture
    #[arg(long, default_value = LIGHT_STATUS_PATH)]
    path: String,
    /// Poll interval in milliseconds
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,
    /// Log directory (if not set, logs to stdout)
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    let _log_guard = setup_logging(&params)?;

    match params.command.clone() {
        Commands::Status { json } => commands::status(params, json).await,
        Commands::Listen => commands::listen(params).await,
        Commands::Toggle => commands::toggle(params).await,
    }
}

fn setup_logging(params: &Params) -> Result<LogGuard> {
    match &params.log_dir {
        Some(log_dir) => {
            let config = LogConfig {
                log_dir: log_dir.clone(),
                ..LogConfig::default()
            };
            Ok(init_file_logging(config)?)
        }
        None => Ok(init_console_logging()),
    }
}
