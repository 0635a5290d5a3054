//! ICS parsing into normalized events, using the icalendar crate's parser.

use calbridge_core::{EventTime, NormalizedEvent};
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{read_calendar, unfold},
};

/// Parse ICS content into a normalized event.
///
/// Returns `None` when the payload has no VEVENT or no usable start time;
/// such resources are skipped rather than failing the whole fetch.
pub fn parse_event(content: &str, calendar_name: &str) -> Option<NormalizedEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "(No title)".to_string());
    let description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());

    let start = to_event_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);

    // DTEND is optional; a missing one means a zero-length event.
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time)
        .unwrap_or_else(|| start.clone());

    Some(NormalizedEvent::new(
        uid,
        summary,
        description,
        location,
        start,
        end,
        calendar_name,
    ))
}

/// Collapse icalendar's time forms into the normalized two: a plain date for
/// all-day events, or a UTC instant. Zoned times resolve through chrono-tz;
/// an unknown TZID falls back to reading the local time as UTC, which at
/// least keeps the value stable across runs.
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(date) => EventTime::Date(date),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => EventTime::DateTime(dt),
            CalendarDateTime::Floating(naive) => EventTime::DateTime(naive.and_utc()),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let utc = tzid
                    .parse::<Tz>()
                    .ok()
                    .and_then(|tz| tz.from_local_datetime(&date_time).single())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| date_time.and_utc());
                EventTime::DateTime(utc)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_a_timed_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:meeting-42@icloud.com\r\n\
SUMMARY:Planning\r\n\
DESCRIPTION:Quarterly planning\r\n\
LOCATION:Room 4\r\n\
DTSTART:20260115T100000Z\r\n\
DTEND:20260115T110000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let event = parse_event(ics, "Work").expect("should parse");

        assert_eq!(event.uid, "meeting-42@icloud.com");
        assert_eq!(event.summary, "Planning");
        assert_eq!(event.description.as_deref(), Some("Quarterly planning"));
        assert_eq!(event.location.as_deref(), Some("Room 4"));
        assert_eq!(event.calendar_name, "Work");
        assert_eq!(
            event.start,
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
        );
        assert!(!event.fingerprint.is_empty());
    }

    #[test]
    fn parses_an_all_day_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:holiday-1@icloud.com\r\n\
SUMMARY:Public holiday\r\n\
DTSTART;VALUE=DATE:20260310\r\n\
DTEND;VALUE=DATE:20260311\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let event = parse_event(ics, "Holidays").expect("should parse");

        assert!(event.start.is_all_day());
        assert_eq!(
            event.start,
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())
        );
        assert_eq!(
            event.end,
            EventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 11).unwrap())
        );
    }

    #[test]
    fn zoned_times_are_normalized_to_utc() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:zoned-1@icloud.com\r\n\
SUMMARY:Call\r\n\
DTSTART;TZID=America/New_York:20260115T100000\r\n\
DTEND;TZID=America/New_York:20260115T103000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let event = parse_event(ics, "Work").expect("should parse");

        // 10:00 Eastern in January is 15:00 UTC.
        assert_eq!(
            event.start,
            EventTime::DateTime(Utc.with_ymd_and_hms(2026, 1, 15, 15, 0, 0).unwrap())
        );
    }

    #[test]
    fn missing_dtend_falls_back_to_start() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:point-1@icloud.com\r\n\
SUMMARY:Reminder\r\n\
DTSTART:20260115T100000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let event = parse_event(ics, "Personal").expect("should parse");
        assert_eq!(event.start, event.end);
    }

    #[test]
    fn payload_without_vevent_is_skipped() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VTODO\r\n\
UID:todo-1@icloud.com\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

        assert!(parse_event(ics, "Personal").is_none());
    }
}
