//! Run a single sync cycle.

use anyhow::{Context, Result};
use calbridge_core::{RunStats, StateStore, SyncEngine, SyncRange};
use chrono::{NaiveDate, Utc};
use owo_colors::OwoColorize;

use super::create_spinner;
use crate::config::Config;
use crate::source::ICloudSource;
use crate::target::GoogleTarget;

pub async fn run(from: Option<&str>, to: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let range = resolve_range(&config, from, to)?;
    let mut engine = build_engine(&config).await?;

    let spinner = create_spinner("Syncing".to_string());
    let result = engine.run_cycle(&range).await;
    spinner.finish_and_clear();

    let stats = result.context("Sync cycle failed")?;
    render_stats(&stats);

    Ok(())
}

pub(crate) async fn build_engine(
    config: &Config,
) -> Result<SyncEngine<ICloudSource, GoogleTarget>> {
    let spinner = create_spinner("Connecting".to_string());
    let source = ICloudSource::connect(&config.icloud).await;
    spinner.finish_and_clear();

    let source = source?;
    println!(
        "Connected to iCloud ({} calendars)",
        source.calendar_count().to_string().green()
    );

    let target = GoogleTarget::connect(&config.google)?;
    let store = StateStore::new(&config.sync.state_file);

    Ok(SyncEngine::new(source, target, store))
}

pub(crate) fn resolve_range(
    config: &Config,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<SyncRange> {
    let start = match from {
        Some(s) => parse_date(s)?,
        None => config
            .sync
            .start_date
            .unwrap_or_else(|| Utc::now().date_naive()),
    };

    let range = SyncRange::from_date(start);
    match to {
        Some(s) => Ok(range.until_date(parse_date(s)?)),
        None => Ok(range),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}'. Expected YYYY-MM-DD"))
}

pub(crate) fn render_stats(stats: &RunStats) {
    println!(
        "Synced: {} created, {} updated, {} deleted, {} unchanged",
        stats.created.to_string().green(),
        stats.updated.to_string().yellow(),
        stats.deleted.to_string().red(),
        stats.unchanged,
    );

    if stats.errors > 0 {
        println!(
            "   {}",
            format!(
                "{} operation(s) failed and will be retried next cycle",
                stats.errors
            )
            .red()
        );
    }
}
