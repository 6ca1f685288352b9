//! Wall-clock helpers.
//!
//! A pass takes its notion of "now" once, up front, so trigger evaluation and recorded timestamps agree.
use std::time::{SystemTime, UNIX_EPOCH};

use time::{OffsetDateTime, UtcOffset, macros::format_description};

/// Current time in whole seconds since the Unix epoch.
pub fn now_epoch() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Render an epoch second as `YYYY-MM-DD HH:MM:SS` in the local offset (UTC when unknown).
pub fn format_timestamp(epoch: i64) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    format_timestamp_at(epoch, offset)
}

pub fn format_timestamp_at(epoch: i64, offset: UtcOffset) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp(epoch)
        .map(|t| t.to_offset(offset))
        .ok()
        .and_then(|t| t.format(&fmt).ok())
        .unwrap_or_else(|| epoch.to_string())
}
