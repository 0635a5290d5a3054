//! Provider-neutral event types.
//!
//! Both collaborators normalize their wire formats into these types, and the
//! engine works exclusively with them for diffing and change detection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint;

/// Start or end of an event. All-day events carry plain dates, timed events
/// are normalized to UTC instants at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Stable textual form used as fingerprint input.
    pub(crate) fn canonical(&self) -> String {
        match self {
            EventTime::Date(date) => date.format("%Y-%m-%d").to_string(),
            EventTime::DateTime(datetime) => datetime.to_rfc3339(),
        }
    }
}

/// A calendar event in the shape source and target agree on.
///
/// `uid` is the source-stable identity and the join key between the two
/// systems. `fingerprint` is derived from the content fields and must be
/// refreshed whenever any of them changes; see the [`fingerprint`] module for
/// which fields participate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    /// Name of the source calendar this event came from. Metadata only, not
    /// a fingerprint input.
    pub calendar_name: String,
    pub fingerprint: String,
}

impl NormalizedEvent {
    pub fn new(
        uid: impl Into<String>,
        summary: impl Into<String>,
        description: Option<String>,
        location: Option<String>,
        start: EventTime,
        end: EventTime,
        calendar_name: impl Into<String>,
    ) -> Self {
        let mut event = NormalizedEvent {
            uid: uid.into(),
            summary: summary.into(),
            description,
            location,
            start,
            end,
            calendar_name: calendar_name.into(),
            fingerprint: String::new(),
        };
        event.refresh_fingerprint();
        event
    }

    /// Recompute the content fingerprint after mutating any of summary,
    /// description, location, start or end.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = fingerprint::compute(self);
    }
}
