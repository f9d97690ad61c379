use chrono::{DateTime, Utc};

/// Date/time formats used in the JSON output
pub mod formats {
    /// ISO 8601 timestamp without offset: "2024-01-20T15:30:00"
    pub const ISO_8601_NAIVE: &str = "%Y-%m-%dT%H:%M:%S";
}

/// Convert a Unix timestamp (seconds) to a UTC datetime, if it is in range
pub fn from_unix_timestamp(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
}

/// Format a UTC datetime as an ISO 8601 timestamp without the offset suffix
pub fn format_iso8601(datetime: &DateTime<Utc>) -> String {
    datetime.format(formats::ISO_8601_NAIVE).to_string()
}

/// Turn an optional `taken_at_timestamp` into the upload date string
pub fn upload_date_from_timestamp(timestamp: Option<i64>) -> Option<String> {
    timestamp
        .and_then(from_unix_timestamp)
        .map(|dt| format_iso8601(&dt))
}
