//! Content fingerprint used as the sole change-detection signal.
//!
//! The digest covers only the fields whose change should propagate to the
//! target: uid, summary, description, location, start and end, plus the
//! all-day flag. Provider metadata (source calendar name, server-side
//! last-modified stamps) is excluded so unrelated server touches never
//! trigger a spurious update.

use sha2::{Digest, Sha256};

use crate::event::NormalizedEvent;

/// Field separator inside the digest input. The ASCII unit separator does not
/// occur in calendar text, so field boundaries stay unambiguous.
const SEP: char = '\u{1f}';

/// Compute the content fingerprint of an event.
///
/// Pure and deterministic: identical logical content always produces the same
/// digest, across runs and process restarts. Collision resistance beyond the
/// accidental is not needed here, this is change detection rather than an
/// integrity check.
pub fn compute(event: &NormalizedEvent) -> String {
    let input = format!(
        "{uid}{SEP}{summary}{SEP}{description}{SEP}{location}{SEP}{start}{SEP}{end}{SEP}{all_day}",
        uid = event.uid,
        summary = event.summary,
        description = event.description.as_deref().unwrap_or(""),
        location = event.location.as_deref().unwrap_or(""),
        start = event.start.canonical(),
        end = event.end.canonical(),
        all_day = event.start.is_all_day(),
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventTime;
    use chrono::{TimeZone, Utc};

    fn sample_event() -> NormalizedEvent {
        NormalizedEvent::new(
            "uid-1@icloud.com",
            "Dentist",
            Some("Bring insurance card".to_string()),
            Some("12 Main St".to_string()),
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()),
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap()),
            "Personal",
        )
    }

    #[test]
    fn identical_content_produces_identical_digest() {
        let a = sample_event();
        let b = sample_event();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(compute(&a), a.fingerprint);
    }

    #[test]
    fn every_content_field_changes_the_digest() {
        let base = sample_event();

        let mut changed = sample_event();
        changed.summary = "Dentist (moved)".to_string();
        changed.refresh_fingerprint();
        assert_ne!(base.fingerprint, changed.fingerprint);

        let mut changed = sample_event();
        changed.description = None;
        changed.refresh_fingerprint();
        assert_ne!(base.fingerprint, changed.fingerprint);

        let mut changed = sample_event();
        changed.location = Some("14 Main St".to_string());
        changed.refresh_fingerprint();
        assert_ne!(base.fingerprint, changed.fingerprint);

        let mut changed = sample_event();
        changed.start = EventTime::DateTime(Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap());
        changed.refresh_fingerprint();
        assert_ne!(base.fingerprint, changed.fingerprint);

        let mut changed = sample_event();
        changed.end = EventTime::DateTime(Utc.with_ymd_and_hms(2026, 3, 10, 11, 0, 0).unwrap());
        changed.refresh_fingerprint();
        assert_ne!(base.fingerprint, changed.fingerprint);
    }

    #[test]
    fn all_day_flag_participates() {
        let timed = sample_event();

        let mut all_day = sample_event();
        all_day.start = EventTime::Date(chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        all_day.end = EventTime::Date(chrono::NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        all_day.refresh_fingerprint();

        assert_ne!(timed.fingerprint, all_day.fingerprint);
    }

    #[test]
    fn unrelated_metadata_does_not_change_the_digest() {
        let base = sample_event();

        let mut moved = sample_event();
        moved.calendar_name = "Work".to_string();
        moved.refresh_fingerprint();

        assert_eq!(base.fingerprint, moved.fingerprint);
    }
}
