//! Configuration at ~/.config/calbridge/config.toml.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Config {
    pub icloud: ICloudConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Deserialize, Clone)]
pub struct ICloudConfig {
    /// Apple ID the calendars belong to.
    pub apple_id: String,
    /// App-specific password generated at appleid.apple.com.
    pub app_password: String,
    /// CalDAV endpoint. Overridable for tests and self-hosted servers.
    #[serde(default = "default_caldav_url")]
    pub caldav_url: String,
}

#[derive(Deserialize, Clone)]
pub struct GoogleConfig {
    /// Google API OAuth client file (the credentials.json download).
    pub credentials_file: PathBuf,
    /// Where `calbridge auth` stores the granted tokens.
    pub token_file: PathBuf,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
}

#[derive(Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Mirror events starting from this date. Defaults to today.
    pub start_date: Option<NaiveDate>,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            state_file: default_state_file(),
            start_date: None,
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_caldav_url() -> String {
    "https://caldav.icloud.com".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_interval_minutes() -> u64 {
    5
}

fn default_state_file() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("calbridge").join("state.json"),
        None => PathBuf::from("calbridge-state.json"),
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("calbridge");

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let contents = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}.\n\n\
                Create it with your iCloud and Google credentials; see config.example.toml",
                path.display()
            )
        })?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }
}
