//! One-time interactive Google consent flow.
//!
//! Opens the consent URL in a browser, catches the redirect on a localhost
//! listener, exchanges the authorization code for tokens, and writes them to
//! the configured token file. Everything after that (refresh, API calls) runs
//! non-interactively off that file.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use anyhow::{Context, Result};
use url::Url;

use super::token::{self, OAuthClient};
use crate::config::GoogleConfig;

const REDIRECT_PORT: u16 = 8085;
const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

pub async fn authorize(config: &GoogleConfig) -> Result<()> {
    let client = OAuthClient::load(&config.credentials_file)?;
    let redirect_uri = format!("http://localhost:{REDIRECT_PORT}/callback");

    let consent_url = consent_url(&client, &redirect_uri)?;
    println!("\nOpen this URL in your browser to authorize calbridge:\n");
    println!("{consent_url}\n");

    if open::that(consent_url.as_str()).is_err() {
        println!("(Could not open the browser automatically; copy the URL above)");
    }

    let code = wait_for_callback()?;
    println!("Received authorization code, exchanging it for tokens...");

    let http = reqwest::Client::new();
    let tokens = token::exchange_code(&http, &client, &code, &redirect_uri).await?;
    tokens.save(&config.token_file)?;

    Ok(())
}

fn consent_url(client: &OAuthClient, redirect_uri: &str) -> Result<Url> {
    let mut url = Url::parse("https://accounts.google.com/o/oauth2/v2/auth")?;

    // access_type=offline plus prompt=consent makes Google include a refresh
    // token in the grant; without it only re-consent would get one.
    url.query_pairs_mut()
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");

    Ok(url)
}

/// Serve a single request on the redirect port and pull the authorization
/// code out of its query string.
fn wait_for_callback() -> Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", REDIRECT_PORT))
        .with_context(|| format!("Failed to listen on port {REDIRECT_PORT}"))?;

    println!("Waiting for the OAuth callback on port {REDIRECT_PORT}...");

    let (mut stream, _) = listener
        .accept()
        .context("Failed to accept the callback connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let path = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;
    let callback = Url::parse(&format!("http://localhost{path}"))?;

    let code = callback
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.to_string())
        .context("Callback carried no authorization code")?;

    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authorized</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";
    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_url_requests_offline_calendar_access() {
        let client = OAuthClient {
            client_id: "id-1".to_string(),
            client_secret: "secret-1".to_string(),
        };

        let url = consent_url(&client, "http://localhost:8085/callback").unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(pairs.contains(&("client_id".to_string(), "id-1".to_string())));
        assert!(pairs.contains(&("scope".to_string(), SCOPE.to_string())));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("prompt".to_string(), "consent".to_string())));
    }
}
