use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use tracing_file_sink::flush::FlushLoop;
use tracing_file_sink::noop_sink::NoopSink;
use tracing_file_sink::options::SinkOptions;

/// Measures the producer side alone: the flush loop drains into a
/// `NoopSink`, so no disk I/O is involved.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = SinkOptions::builder()
        .queue_capacity(Some(50_000))
        .batch_size(1_000)
        .flush_period(Duration::from_millis(200))
        .build()?;

    let flush = Arc::new(FlushLoop::new(Arc::new(NoopSink), options));
    flush.start()?;

    let threads: u64 = 4;
    let per_thread: u64 = 100_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let producer = flush.producer();
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    producer.log(format!("thread {t} custom load test error {i}\n"));
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }

    let elapsed = start.elapsed();
    let n = threads * per_thread;
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    flush.stop().await;
    let stats = flush.queue().stats();
    println!("enqueued {}, dropped {}", stats.enqueued, stats.dropped);
    Ok(())
}
