use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A single fully rendered log line waiting to be persisted.
///
/// Records are immutable once created. Ownership moves from the producer
/// into the [`IngestQueue`](crate::queue::IngestQueue), then to the flush
/// loop and finally to the [`LogSink`](crate::sink::LogSink) that writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    /// Text written verbatim; it carries its own line terminator.
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp,
            message: message.into(),
        }
    }

    /// Record stamped with the current time.
    pub fn now(message: impl Into<String>) -> Self {
        Self::new(Utc::now(), message)
    }

    /// Calendar day (UTC) used to pick the destination file.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
