//! Time window a sync cycle covers.

use chrono::{DateTime, NaiveDate, Utc};

/// Window passed to the source reader on each cycle.
///
/// `end: None` means unbounded above; the reader may cap it at whatever its
/// provider allows. Keeping the window stable between runs matters: an event
/// that falls outside the queried window is indistinguishable from a deleted
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl SyncRange {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        SyncRange { start, end }
    }

    /// Window starting at midnight UTC of `date`, unbounded above.
    pub fn from_date(date: NaiveDate) -> Self {
        SyncRange {
            start: date.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            end: None,
        }
    }

    /// Cap the window at end-of-day UTC of `date`.
    pub fn until_date(mut self, date: NaiveDate) -> Self {
        self.end = Some(date.and_hms_opt(23, 59, 59).unwrap().and_utc());
        self
    }
}
