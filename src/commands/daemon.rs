//! Periodic sync loop.

use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::signal;
use tokio::time::sleep;

use super::sync;
use crate::config::Config;

pub async fn run(interval: Option<u64>, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let range = sync::resolve_range(&config, from, to)?;
    let minutes = interval.unwrap_or(config.sync.interval_minutes).max(1);
    let interval = Duration::from_secs(minutes * 60);

    let mut engine = sync::build_engine(&config).await?;

    println!("Syncing every {minutes} minutes. Press Ctrl-C to stop.\n");

    loop {
        // A failed cycle is reported and retried at the next tick; the
        // daemon itself keeps running.
        match engine.run_cycle(&range).await {
            Ok(stats) => sync::render_stats(&stats),
            Err(e) => println!("   {}", e.to_string().red()),
        }

        // Ctrl-C only stops scheduling new cycles; an in-flight cycle above
        // always finishes, so the state file is never torn by shutdown.
        tokio::select! {
            _ = sleep(interval) => {}
            _ = signal::ctrl_c() => {
                println!("\nStopping.");
                break;
            }
        }
    }

    Ok(())
}
