use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Failure reported by a [`LogSink`] for one batch.
///
/// The flush loop logs it and moves on to the next batch; it never reaches
/// the producers.
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("log sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Other(Box<dyn Error + Send + Sync>),
}

/// Asynchronous destination for batches of [`LogRecord`]s drained by the
/// flush loop.
///
/// Implementations are responsible for persisting records to a concrete
/// backend (daily files, stdout, etc). The loop calls `write_batch` from a
/// background task, one batch at a time and in order, and never on an
/// application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Persist one ordered batch of records.
    ///
    /// **Parameters**
    /// - `batch`: at most `batch_size` records, oldest first. Ownership is
    ///   handed over to the sink.
    ///
    /// **Returns**
    /// - `Ok(())` if the batch was handled, including when a policy decided
    ///   to drop some records.
    /// - `Err(..)` if the backend failed. The batch is not retried.
    async fn write_batch(&self, batch: Vec<LogRecord>) -> Result<(), WriteError>;
}
