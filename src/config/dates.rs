//! Date parsing for the `from`/`to` bounds

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::error::{ConfigError, Result};

/// `MM/dd/yyyy-HH:mm:ss`, interpreted in local time
const LOCAL_FORMAT: &str = "%m/%d/%Y-%H:%M:%S";
/// `MMMM d yyyy HH:mm:ss Z`, e.g. `January 5 2024 13:00:00 +0100`
const ZONED_FORMAT: &str = "%B %d %Y %H:%M:%S %z";

/// Parse a date in any accepted format into nanoseconds since the epoch
pub fn parse_timestamp_ns(text: &str) -> Result<i64> {
    let text = text.trim();
    let parsed = parse_local(text)
        .or_else(|| DateTime::parse_from_str(text, ZONED_FORMAT).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok());

    let date = parsed.ok_or_else(|| ConfigError::InvalidDate(text.to_string()))?;

    date.timestamp_nanos_opt()
        .ok_or_else(|| ConfigError::InvalidDate(format!("{text}, out of range")).into())
}

fn parse_local(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(text, LOCAL_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
}
