use crate::options::SinkOptions;
use crate::queue::{IngestQueue, LogProducer};
use crate::record::LogRecord;
use crate::sink::LogSink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, warn};

/// Lifecycle of a [`FlushLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    /// `stop()` is performing the final flush.
    Draining,
}

#[derive(thiserror::Error, Debug)]
pub enum FlushLoopError {
    #[error("flush loop must be started from within a Tokio runtime")]
    NoRuntime,
    #[error("flush loop is still draining after stop()")]
    Draining,
}

/// Background worker that periodically drains an [`IngestQueue`] and hands
/// the records to a [`LogSink`] in chunks of at most `batch_size`.
///
/// Chunks are written one after another, never concurrently, so appends to
/// a destination stay ordered. A failing chunk is reported through `tracing`
/// and the loop carries on.
pub struct FlushLoop {
    queue: Arc<IngestQueue>,
    sink: Arc<dyn LogSink>,
    options: SinkOptions,
    /// Serializes periodic ticks and on-demand flushes.
    write_lock: Arc<tokio::sync::Mutex<()>>,
    /// Records drained from the queue but not yet handed to the sink.
    in_flight: Arc<AtomicUsize>,
    control: Mutex<Control>,
}

struct Control {
    state: LoopState,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl FlushLoop {
    /// Create a stopped loop with its own queue sized from `options`.
    pub fn new(sink: Arc<dyn LogSink>, options: SinkOptions) -> Self {
        let queue = Arc::new(IngestQueue::new(options.queue_capacity()));
        Self::with_queue(queue, sink, options)
    }

    pub fn with_queue(queue: Arc<IngestQueue>, sink: Arc<dyn LogSink>, options: SinkOptions) -> Self {
        FlushLoop {
            queue,
            sink,
            options,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            control: Mutex::new(Control {
                state: LoopState::Stopped,
                shutdown: None,
                task: None,
            }),
        }
    }

    /// Handle for producers feeding this loop.
    pub fn producer(&self) -> LogProducer {
        LogProducer::new(Arc::clone(&self.queue))
    }

    pub fn queue(&self) -> &Arc<IngestQueue> {
        &self.queue
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    pub fn state(&self) -> LoopState {
        self.control().state
    }

    /// Spawn the periodic flush task. Calling it on a running loop does
    /// nothing; calling it while `stop()` is draining is an error.
    pub fn start(&self) -> Result<(), FlushLoopError> {
        let mut control = self.control();
        match control.state {
            LoopState::Running => return Ok(()),
            LoopState::Draining => return Err(FlushLoopError::Draining),
            LoopState::Stopped => {}
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FlushLoopError::NoRuntime)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(self.worker().run(self.options.flush_period(), shutdown_rx));
        self.queue.reopen();

        control.state = LoopState::Running;
        control.shutdown = Some(shutdown_tx);
        control.task = Some(task);
        debug!(period = ?self.options.flush_period(), "flush loop started");
        Ok(())
    }

    /// Drain the queue and write everything now, outside the timer.
    pub async fn flush(&self) {
        self.worker().flush_pending(Vec::new(), None).await;
    }

    /// Cancel the timer, run one final flush bounded by the shutdown
    /// timeout and return once the loop is stopped. The queue is closed
    /// afterwards, so later records are dropped until the next `start()`.
    ///
    /// Returns how many accepted records were never written: those the
    /// final flush had not finished when the timeout hit, plus any that
    /// arrived after the final drain. Does nothing and returns 0 if the
    /// loop is not running.
    pub async fn stop(&self) -> usize {
        let (shutdown, task) = {
            let mut control = self.control();
            if control.state != LoopState::Running {
                return 0;
            }
            control.state = LoopState::Draining;
            (control.shutdown.take(), control.task.take())
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        let mut lost = 0;
        if let Some(mut task) = task {
            let timeout = self.options.shutdown_timeout();
            match time::timeout(timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "flush task ended abnormally"),
                Err(_) => {
                    task.abort();
                    let _ = task.await;
                    lost = self.in_flight.swap(0, Ordering::AcqRel) + self.queue.drain_all().len();
                    warn!(
                        ?timeout,
                        lost,
                        "final log flush timed out, remaining records are lost"
                    );
                }
            }
        }

        self.queue.close();
        // Enqueued after the final drain but before close().
        let stranded = self.queue.drain_all().len();
        if stranded > 0 {
            warn!(stranded, "log records arrived during shutdown and were lost");
            lost += stranded;
        }
        self.control().state = LoopState::Stopped;
        debug!("flush loop stopped");
        lost
    }

    fn worker(&self) -> Worker {
        Worker {
            queue: Arc::clone(&self.queue),
            sink: Arc::clone(&self.sink),
            batch_size: self.options.batch_size(),
            write_lock: Arc::clone(&self.write_lock),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Worker {
    queue: Arc<IngestQueue>,
    sink: Arc<dyn LogSink>,
    batch_size: usize,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    in_flight: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut leftover = Vec::new();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    leftover = self.flush_pending(Vec::new(), Some(&shutdown)).await;
                    if !leftover.is_empty() {
                        break;
                    }
                }
                // An error means the loop handle was dropped; shut down too.
                _ = shutdown.changed() => break,
            }
        }

        self.flush_pending(leftover, None).await;
    }

    /// Write `carried` followed by everything currently queued. With a
    /// shutdown signal, stops between chunks once it fires and returns the
    /// records not yet written.
    async fn flush_pending(
        &self,
        carried: Vec<LogRecord>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Vec<LogRecord> {
        let _guard = self.write_lock.lock().await;

        // `carried` records are already counted in `in_flight`.
        let drained = self.queue.drain_all();
        self.in_flight.fetch_add(drained.len(), Ordering::AcqRel);
        let mut pending = carried;
        pending.extend(drained);
        if pending.is_empty() {
            return Vec::new();
        }

        let cancelled = || shutdown.is_some_and(|rx| *rx.borrow());
        let mut records = pending.into_iter();
        loop {
            if cancelled() {
                return records.collect();
            }
            let chunk: Vec<LogRecord> = records.by_ref().take(self.batch_size).collect();
            if chunk.is_empty() {
                return Vec::new();
            }
            let len = chunk.len();
            let result = self.sink.write_batch(chunk).await;
            self.in_flight.fetch_sub(len, Ordering::AcqRel);
            if let Err(e) = result {
                warn!(error = %e, records = len, "failed to write log batch");
            }
        }
    }
}
