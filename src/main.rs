mod commands;
mod config;
mod source;
mod target;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calbridge")]
#[command(about = "Mirror iCloud calendars into a Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize access to the target Google Calendar
    Auth,
    /// Run a single sync cycle
    Sync {
        /// Sync events from this date (YYYY-MM-DD); defaults to the
        /// configured start date
        #[arg(long)]
        from: Option<String>,

        /// Sync events until this date (YYYY-MM-DD); unbounded if omitted
        #[arg(long)]
        to: Option<String>,
    },
    /// Run sync cycles on an interval until interrupted
    Daemon {
        /// Minutes between cycles (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Sync events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Sync events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Show how many events are mirrored and when the last sync ran
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => commands::auth::run().await,
        Commands::Sync { from, to } => commands::sync::run(from.as_deref(), to.as_deref()).await,
        Commands::Daemon { interval, from, to } => {
            commands::daemon::run(interval, from.as_deref(), to.as_deref()).await
        }
        Commands::Status => commands::status::run(),
    }
}
