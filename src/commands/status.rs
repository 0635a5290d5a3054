//! Show mirror bookkeeping without touching the network.

use anyhow::Result;
use calbridge_core::StateStore;
use owo_colors::OwoColorize;

use crate::config::Config;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    let state = StateStore::new(&config.sync.state_file).load();

    println!(
        "Mirrored events: {}",
        state.records.len().to_string().green()
    );
    match state.last_sync {
        Some(at) => println!("Last sync:       {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync:       {}", "never".dimmed()),
    }

    Ok(())
}
