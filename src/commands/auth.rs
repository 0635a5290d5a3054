//! One-time Google OAuth authorization.

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::target::oauth;

pub async fn run() -> Result<()> {
    let config = Config::load()?;

    oauth::authorize(&config.google).await?;

    println!(
        "\n{} Tokens saved to {}",
        "Authorized.".green(),
        config.google.token_file.display()
    );
    println!("Run `calbridge sync` to start mirroring.");

    Ok(())
}
