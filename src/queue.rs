use crate::record::LogRecord;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Producer-facing buffer between application threads and the flush loop.
///
/// `enqueue` never blocks on I/O and never fails: when a capacity is set and
/// the queue is full, the record is dropped and only counted. The lock is
/// held for a push or a buffer swap, never across a write.
#[derive(Debug)]
pub struct IngestQueue {
    records: Mutex<Vec<LogRecord>>,
    capacity: Option<usize>,
    /// Set once the flush loop stopped; enqueues are dropped while set.
    closed: AtomicBool,
    /// Successfully enqueued.
    enqueued: AtomicU64,
    /// Dropped because the queue was full or closed.
    dropped: AtomicU64,
}

/// Snapshot of the queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dropped: u64,
}

impl IngestQueue {
    /// `capacity: None` makes the queue unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        IngestQueue {
            records: Mutex::new(Vec::new()),
            capacity,
            closed: AtomicBool::new(false),
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn enqueue(&self, record: LogRecord) {
        if self.is_closed() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let mut records = self.lock();
        if self.capacity.is_some_and(|cap| records.len() >= cap) {
            drop(records);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        records.push(record);
        drop(records);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove and return everything queued so far, oldest first.
    pub fn drain_all(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Reject further records; they are counted as dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    // A producer that panicked mid-push cannot leave the Vec inconsistent,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cheap cloneable handle given to producers.
///
/// This is the only ingress into the sink: it stamps a message with the
/// current time and enqueues it. Producers get no success or failure signal.
#[derive(Debug, Clone)]
pub struct LogProducer {
    queue: Arc<IngestQueue>,
}

impl LogProducer {
    pub fn new(queue: Arc<IngestQueue>) -> Self {
        LogProducer { queue }
    }

    /// Enqueue an already rendered message stamped with `Utc::now()`.
    pub fn log(&self, message: impl Into<String>) {
        self.queue.enqueue(LogRecord::now(message));
    }

    pub fn enqueue(&self, record: LogRecord) {
        self.queue.enqueue(record);
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize) -> LogRecord {
        LogRecord::now(format!("line {i}\n"))
    }

    #[test]
    fn drain_preserves_enqueue_order_and_empties_queue() {
        let queue = IngestQueue::new(None);
        for i in 0..5 {
            queue.enqueue(record(i));
        }

        let drained = queue.drain_all();
        let messages: Vec<_> = drained.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["line 0\n", "line 1\n", "line 2\n", "line 3\n", "line 4\n"]);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn overflow_drops_newest_records_and_counts_them() {
        let queue = IngestQueue::new(Some(3));
        for i in 0..5 {
            queue.enqueue(record(i));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.stats(), QueueStats { enqueued: 3, dropped: 2 });

        let drained = queue.drain_all();
        assert_eq!(drained.last().unwrap().message, "line 2\n");

        // Space is available again after a drain.
        queue.enqueue(record(9));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let queue = IngestQueue::new(Some(0));
        queue.enqueue(record(0));
        assert!(queue.is_empty());
        assert_eq!(queue.stats().dropped, 1);
    }

    #[test]
    fn closed_queue_drops_and_counts() {
        let queue = IngestQueue::new(None);
        queue.enqueue(record(0));
        queue.close();
        for i in 1..1000 {
            queue.enqueue(record(i));
        }

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats(), QueueStats { enqueued: 1, dropped: 999 });

        queue.reopen();
        queue.enqueue(record(1000));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn concurrent_producers_never_exceed_capacity() {
        let queue = Arc::new(IngestQueue::new(Some(100)));

        std::thread::scope(|scope| {
            for t in 0..8 {
                let producer = LogProducer::new(Arc::clone(&queue));
                scope.spawn(move || {
                    for i in 0..50 {
                        producer.log(format!("t{t} {i}\n"));
                    }
                });
            }
        });

        assert_eq!(queue.len(), 100);
        assert_eq!(queue.stats(), QueueStats { enqueued: 100, dropped: 300 });
    }

    #[test]
    fn per_producer_order_is_kept_across_threads() {
        let queue = Arc::new(IngestQueue::new(None));

        std::thread::scope(|scope| {
            for t in 0..4 {
                let producer = LogProducer::new(Arc::clone(&queue));
                scope.spawn(move || {
                    for i in 0..200 {
                        producer.log(format!("{t}:{i}"));
                    }
                });
            }
        });

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 800);
        for t in 0..4 {
            let seen: Vec<usize> = drained
                .iter()
                .filter_map(|r| r.message.strip_prefix(&format!("{t}:")))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..200).collect::<Vec<_>>());
        }
    }
}
