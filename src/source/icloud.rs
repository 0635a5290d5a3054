//! iCloud CalDAV source collaborator.

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use calbridge_core::{NormalizedEvent, SourceCalendar, SyncError, SyncRange, SyncResult};
use tracing::warn;

use super::caldav::{CalendarRef, DavClient};
use super::parse::parse_event;
use crate::config::ICloudConfig;

/// Reads events out of every calendar collection in an iCloud account.
pub struct ICloudSource {
    dav: DavClient,
    calendars: Vec<CalendarRef>,
}

impl ICloudSource {
    /// Authenticate and discover the account's calendar collections.
    pub async fn connect(config: &ICloudConfig) -> Result<Self> {
        let dav = DavClient::new(&config.apple_id, &config.app_password)?;

        let principal = dav
            .find_principal(&config.caldav_url)
            .await
            .context("Could not reach iCloud; check the Apple ID and app-specific password")?;
        let home = dav.find_calendar_home(&principal).await?;
        let calendars = dav.list_calendars(&home).await?;

        if calendars.is_empty() {
            bail!("No calendars found for {}", config.apple_id);
        }

        Ok(ICloudSource { dav, calendars })
    }

    pub fn calendar_count(&self) -> usize {
        self.calendars.len()
    }
}

impl SourceCalendar for ICloudSource {
    async fn fetch_events(&self, range: &SyncRange) -> SyncResult<Vec<NormalizedEvent>> {
        let mut events = Vec::new();
        let mut seen = HashSet::new();
        let mut failed = 0;

        for calendar in &self.calendars {
            let payloads = match self.dav.calendar_query(&calendar.url, range).await {
                Ok(payloads) => payloads,
                Err(e) => {
                    warn!(calendar = %calendar.name, error = %e, "skipping calendar this cycle");
                    failed += 1;
                    continue;
                }
            };

            for ics in payloads {
                if let Some(event) = parse_event(&ics, &calendar.name) {
                    if seen.insert(event.uid.clone()) {
                        events.push(event);
                    }
                }
            }
        }

        // One broken calendar is skipped for a cycle; all of them failing
        // means the account is unreachable, and returning an empty snapshot
        // would read as "everything was deleted at the source".
        if failed == self.calendars.len() {
            return Err(SyncError::Fetch(format!(
                "all {failed} calendars failed to fetch"
            )));
        }

        Ok(events)
    }
}
