//! Well-known message headers

use chrono::{DateTime, NaiveDateTime, Utc};

pub const MESSAGE_ID: &str = "NServiceBus.MessageId";
pub const ENCLOSED_MESSAGE_TYPES: &str = "NServiceBus.EnclosedMessageTypes";
pub const CONTENT_TYPE: &str = "NServiceBus.ContentType";
pub const ORIGINATING_ENDPOINT: &str = "NServiceBus.OriginatingEndpoint";
pub const TIME_SENT: &str = "NServiceBus.TimeSent";

/// Wire format of timestamp headers: `2024-01-31 12:00:05:250000 Z`
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S:%6f Z";

/// Format a timestamp for a header
pub fn to_wire_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(WIRE_TIME_FORMAT).to_string()
}

/// Parse a timestamp header; `None` when malformed
pub fn from_wire_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, WIRE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
