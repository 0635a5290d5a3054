//! Source-side collaborator: reads normalized events out of iCloud calendars
//! over CalDAV.

mod caldav;
mod icloud;
mod parse;

pub use icloud::ICloudSource;
