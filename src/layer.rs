use crate::queue::LogProducer;
use crate::record::LogRecord;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that renders events into text lines and
/// enqueues them for the background flush loop.
///
/// Rendering happens on the calling thread; the enqueue is a short locked
/// push, so application threads never wait on disk I/O. Events emitted by
/// this crate itself are ignored, which keeps sink diagnostics from being
/// fed back into the sink.
pub struct FileLogLayer {
    producer: LogProducer,
    min_level: Level,
}

impl FileLogLayer {
    /// Capture events at `min_level` or more severe.
    pub fn new(producer: LogProducer, min_level: Level) -> Self {
        FileLogLayer { producer, min_level }
    }

    pub fn producer(&self) -> &LogProducer {
        &self.producer
    }
}

impl<S> Layer<S> for FileLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.min_level || is_internal(meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let timestamp = Utc::now();
        let message = render_line(timestamp, meta.level(), meta.target(), &visitor.finish());
        self.producer.enqueue(LogRecord::new(timestamp, message));
    }
}

fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(crate::CRATE_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// `2024-03-01 23:59:00.000 +00:00 [ERROR] app::db: message key=value\n`
pub fn render_line(timestamp: DateTime<Utc>, level: &Level, target: &str, body: &str) -> String {
    format!(
        "{} [{}] {}: {}\n",
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f %:z"),
        level,
        target,
        body
    )
}

/// Collects the `message` field and appends other fields as `key=value`.
#[derive(Default)]
pub struct FieldVisitor {
    message: String,
    fields: String,
}

impl FieldVisitor {
    fn push_field(&mut self, field: &Field, value: std::fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }

    /// Message followed by the fields, separated by a space.
    pub fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push_field(field, format_args!("{}", value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push_field(field, format_args!("{}", value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_field(field, format_args!("{}", value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push_field(field, format_args!("{}", value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::IngestQueue;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn capture<F: FnOnce()>(min_level: Level, emit: F) -> Vec<LogRecord> {
        let queue = Arc::new(IngestQueue::new(None));
        let layer = FileLogLayer::new(LogProducer::new(Arc::clone(&queue)), min_level);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, emit);
        queue.drain_all()
    }

    #[test]
    fn renders_timestamp_level_target_and_message() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap();
        let line = render_line(ts, &Level::WARN, "app::db", "slow query");
        assert_eq!(line, "2024-03-01 23:59:00.000 +00:00 [WARN] app::db: slow query\n");
    }

    #[test]
    fn event_becomes_one_record_with_fields() {
        let records = capture(Level::INFO, || {
            tracing::error!(target: "hooks", repo = "octo/app", attempt = 2, "script failed");
        });

        assert_eq!(records.len(), 1);
        let message = &records[0].message;
        assert!(message.ends_with(
            " [ERROR] hooks: script failed repo=\"octo/app\" attempt=2\n"
        ));
        let stamp = records[0].timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        assert!(message.starts_with(&stamp));
    }

    #[test]
    fn events_below_min_level_are_ignored() {
        let records = capture(Level::WARN, || {
            tracing::info!(target: "app", "chatty");
            tracing::debug!(target: "app", "chattier");
            tracing::warn!(target: "app", "kept");
        });

        assert_eq!(records.len(), 1);
        assert!(records[0].message.contains("[WARN]"));
    }

    #[test]
    fn own_diagnostics_are_not_captured() {
        let records = capture(Level::TRACE, || {
            tracing::warn!(target: "tracing_file_sink::flush", "failed to write log batch");
            tracing::warn!(target: "tracing_file_sink_extra", "different crate");
        });

        assert_eq!(records.len(), 1);
        assert!(records[0].message.contains("different crate"));
    }

    #[test]
    fn events_keep_emission_order() {
        let records = capture(Level::INFO, || {
            for i in 0..10 {
                tracing::info!(target: "app", i, "tick");
            }
        });

        let expected: Vec<String> = (0..10).map(|i| format!("tick i={i}\n")).collect();
        let bodies: Vec<String> = records
            .iter()
            .map(|r| r.message.split(": ").nth(1).unwrap().to_string())
            .collect();
        assert_eq!(bodies, expected);
    }
}
