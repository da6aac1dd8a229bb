use crate::record::LogRecord;
use crate::sink::{LogSink, WriteError};
use async_trait::async_trait;
use std::io::{self, Write};

/// Writes every message to stdout, in batch order.
#[derive(Clone, Default)]
pub struct ConsoleSink;

fn write_all_to<W: Write>(mut out: W, batch: &[LogRecord]) -> io::Result<()> {
    for record in batch {
        out.write_all(record.message.as_bytes())?;
    }
    out.flush()
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn write_batch(&self, batch: Vec<LogRecord>) -> Result<(), WriteError> {
        tokio::task::spawn_blocking(move || write_all_to(io::stdout().lock(), &batch)).await??;
        Ok(())
    }
}
