//! Minimal CalDAV client: principal discovery, calendar enumeration, and
//! time-range event queries over plain WebDAV requests.
//!
//! iCloud redirects accounts to user-specific servers (pXX-caldav.icloud.com),
//! so every response's final URL is used as the base when resolving hrefs.

use anyhow::{Context, Result, bail};
use calbridge_core::SyncRange;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use url::Url;

/// A calendar collection discovered under the account's calendar home.
#[derive(Debug, Clone)]
pub struct CalendarRef {
    pub url: String,
    pub name: String,
}

/// HTTP client carrying basic-auth credentials for one CalDAV account.
pub struct DavClient {
    http: Client,
    username: String,
    password: String,
}

impl DavClient {
    pub fn new(username: &str, password: &str) -> Result<Self> {
        // Redirects are followed manually below: reqwest drops basic auth
        // when a redirect crosses hosts, which every iCloud account does.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(DavClient {
            http,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn request(
        &self,
        method: &'static [u8],
        url: &str,
        depth: &str,
        body: String,
    ) -> Result<(Url, String)> {
        let mut url = Url::parse(url).with_context(|| format!("Invalid URL '{url}'"))?;

        for _ in 0..10 {
            let response = self
                .http
                .request(Method::from_bytes(method).unwrap(), url.clone())
                .basic_auth(&self.username, Some(&self.password))
                .header("Content-Type", "application/xml; charset=utf-8")
                .header("Depth", depth)
                .body(body.clone())
                .send()
                .await
                .with_context(|| format!("Request to {url} failed"))?;

            if response.status().is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .with_context(|| format!("{url} redirected without a Location header"))?;
                url = url
                    .join(location)
                    .with_context(|| format!("Invalid redirect target '{location}'"))?;
                continue;
            }

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;

            if !status.is_success() {
                bail!("{url} returned {status}");
            }

            return Ok((url, text));
        }

        bail!("Too many redirects for {url}")
    }

    /// Discover the principal URL for the authenticated user.
    pub async fn find_principal(&self, base_url: &str) -> Result<String> {
        const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:current-user-principal/></d:prop>
</d:propfind>"#;

        let (final_url, text) = self
            .request(b"PROPFIND", base_url, "0", BODY.to_string())
            .await?;

        let href = find_href_in(&text, "current-user-principal")
            .context("No current-user-principal in response")?;
        absolutize(&final_url, &href)
    }

    /// Discover the calendar home collection of a principal.
    pub async fn find_calendar_home(&self, principal_url: &str) -> Result<String> {
        const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><c:calendar-home-set/></d:prop>
</d:propfind>"#;

        let (final_url, text) = self
            .request(b"PROPFIND", principal_url, "0", BODY.to_string())
            .await?;

        let href =
            find_href_in(&text, "calendar-home-set").context("No calendar-home-set in response")?;
        absolutize(&final_url, &href)
    }

    /// Enumerate the calendar collections under a calendar home.
    pub async fn list_calendars(&self, home_url: &str) -> Result<Vec<CalendarRef>> {
        const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

        let (final_url, text) = self
            .request(b"PROPFIND", home_url, "1", BODY.to_string())
            .await?;

        parse_calendar_list(&text, &final_url)
    }

    /// Fetch the raw ICS payload of every VEVENT resource in the window,
    /// using a calendar-query REPORT with server-side time-range filtering.
    pub async fn calendar_query(&self, calendar_url: &str, range: &SyncRange) -> Result<Vec<String>> {
        let start = format_caldav_datetime(&range.start);
        let time_range = match range.end {
            Some(end) => format!(
                r#"<C:time-range start="{start}" end="{}"/>"#,
                format_caldav_datetime(&end)
            ),
            None => format!(r#"<C:time-range start="{start}"/>"#),
        };

        let body = format!(
            r#"<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                {time_range}
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#
        );

        let (_, text) = self.request(b"REPORT", calendar_url, "1", body).await?;
        parse_calendar_data(&text)
    }
}

/// Find the href inside the first occurrence of `property` (namespace
/// prefixes vary between servers, so matching is on local names).
fn find_href_in(xml: &str, property: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    let node = doc
        .root_element()
        .descendants()
        .find(|n| n.tag_name().name() == property)?;

    node.descendants()
        .find(|n| n.tag_name().name() == "href")
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
}

/// Parse calendar collections from a PROPFIND multistatus response.
/// Collections without a `<calendar/>` resourcetype (the home itself,
/// inbox/outbox, reminder lists) are skipped.
fn parse_calendar_list(xml: &str, base: &Url) -> Result<Vec<CalendarRef>> {
    let doc = roxmltree::Document::parse(xml).context("Invalid multistatus response")?;
    let mut calendars = Vec::new();

    for response in doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
    {
        let is_calendar = response.descendants().any(|n| {
            n.tag_name().name() == "resourcetype"
                && n.children().any(|c| c.tag_name().name() == "calendar")
        });
        if !is_calendar {
            continue;
        }

        let Some(href) = response
            .descendants()
            .find(|n| n.tag_name().name() == "href")
            .and_then(|n| n.text())
        else {
            continue;
        };

        let name = response
            .descendants()
            .find(|n| n.tag_name().name() == "displayname")
            .and_then(|n| n.text())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                href.trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or("Calendar")
                    .to_string()
            });

        calendars.push(CalendarRef {
            url: absolutize(base, href)?,
            name,
        });
    }

    Ok(calendars)
}

/// Pull the `calendar-data` payloads out of a REPORT multistatus response.
fn parse_calendar_data(xml: &str) -> Result<Vec<String>> {
    let doc = roxmltree::Document::parse(xml).context("Invalid multistatus response")?;
    let mut payloads = Vec::new();

    for response in doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
    {
        if let Some(data) = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text())
        {
            payloads.push(data.to_string());
        }
    }

    Ok(payloads)
}

fn absolutize(base: &Url, href: &str) -> Result<String> {
    let url = base
        .join(href)
        .with_context(|| format!("Invalid href '{href}'"))?;
    Ok(url.to_string())
}

/// Format an instant for CalDAV time-range filters: `YYYYMMDDTHHMMSSZ`.
fn format_caldav_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.format("%Y%m%dT%H%M%SZ").to_string()
}
