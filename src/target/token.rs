//! OAuth client and token storage for the Google collaborator.
//!
//! The credentials file is the OAuth client downloaded from the Google Cloud
//! console; the token file is written by `calbridge auth` and refreshed in
//! place whenever the access token expires.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// OAuth client id and secret from a credentials.json download.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

/// Google wraps the client under a key named after the application type.
#[derive(Deserialize)]
struct CredentialsFile {
    installed: Option<OAuthClient>,
    web: Option<OAuthClient>,
}

impl OAuthClient {
    /// Load the client from a credentials.json, accepting both the
    /// `installed` and `web` application shapes.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Google credentials at {}", path.display()))?;
        let file: CredentialsFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        file.installed.or(file.web).with_context(|| {
            format!(
                "{} has neither an \"installed\" nor a \"web\" client",
                path.display()
            )
        })
    }
}

/// Granted tokens, as persisted in the token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read Google tokens at {}.\n\n\
                Run `calbridge auth` to authorize access first",
                path.display()
            )
        })?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Whether the access token is expired or about to expire. The one-minute
    /// margin keeps a token from running out mid-request.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now() + Duration::minutes(1),
            None => false,
        }
    }
}

/// Shape of the token endpoint's grant and refresh responses.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

fn expires_at(expires_in: i64) -> Option<DateTime<Utc>> {
    (expires_in > 0).then(|| Utc::now() + Duration::seconds(expires_in))
}

async fn token_request(
    http: &Client,
    params: &[(&str, &str)],
    what: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(TOKEN_ENDPOINT)
        .form(params)
        .send()
        .await
        .with_context(|| format!("{what} request failed"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{what} failed: {status}: {body}");
    }

    response
        .json()
        .await
        .with_context(|| format!("{what} returned an invalid response"))
}

/// Exchange an authorization code for tokens at the end of the consent flow.
pub async fn exchange_code(
    http: &Client,
    client: &OAuthClient,
    code: &str,
    redirect_uri: &str,
) -> Result<StoredTokens> {
    let granted = token_request(
        http,
        &[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ],
        "Token exchange",
    )
    .await?;

    let refresh_token = granted.refresh_token.context(
        "Google granted no refresh token. Revoke the app's access at \
        myaccount.google.com/permissions and run `calbridge auth` again",
    )?;

    Ok(StoredTokens {
        access_token: granted.access_token,
        refresh_token,
        expires_at: expires_at(granted.expires_in),
    })
}

/// Refresh an expired access token. Google usually omits the refresh token
/// from refresh responses, in which case the stored one keeps being used.
pub async fn refresh(
    http: &Client,
    client: &OAuthClient,
    tokens: &StoredTokens,
) -> Result<StoredTokens> {
    let granted = token_request(
        http,
        &[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("refresh_token", tokens.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ],
        "Token refresh",
    )
    .await?;

    Ok(StoredTokens {
        access_token: granted.access_token,
        refresh_token: granted
            .refresh_token
            .unwrap_or_else(|| tokens.refresh_token.clone()),
        expires_at: expires_at(granted.expires_in),
    })
}

/// Current tokens behind a single-writer lock.
///
/// Refreshes are serialized through the lock so concurrent requests can never
/// race two refreshes against the token file.
pub struct TokenKeeper {
    client: OAuthClient,
    path: PathBuf,
    tokens: Mutex<StoredTokens>,
}

impl TokenKeeper {
    pub fn new(client: OAuthClient, path: PathBuf, tokens: StoredTokens) -> Self {
        TokenKeeper {
            client,
            path,
            tokens: Mutex::new(tokens),
        }
    }

    /// The current access token, refreshed and re-persisted first if expired.
    pub async fn access_token(&self, http: &Client) -> Result<String> {
        let mut tokens = self.tokens.lock().await;

        if tokens.needs_refresh() {
            *tokens = refresh(http, &self.client, &tokens).await?;
            tokens.save(&self.path)?;
        }

        Ok(tokens.access_token.clone())
    }
}
