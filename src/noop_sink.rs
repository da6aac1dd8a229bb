use crate::record::LogRecord;
use crate::sink::{LogSink, WriteError};
use async_trait::async_trait;

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the queue and the flush loop
/// without any disk I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn write_batch(&self, _batch: Vec<LogRecord>) -> Result<(), WriteError> {
        Ok(())
    }
}
