use std::fs;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use tracing_file_sink::file_sink::FileSink;
use tracing_file_sink::flush::{FlushLoop, LoopState};
use tracing_file_sink::options::FileSinkOptions;
use tracing_file_sink::record::LogRecord;

fn file_loop(options: &FileSinkOptions) -> FlushLoop {
    let sink = Arc::new(FileSink::new(options));
    FlushLoop::new(sink, options.sink().clone())
}

fn record(day: u32, minute: u32, message: &str) -> LogRecord {
    LogRecord::new(
        Utc.with_ymd_and_hms(2024, 3, day, 12, minute, 0).unwrap(),
        message,
    )
}

#[tokio::test]
async fn stop_persists_queued_records_in_order() {
    let dir = tempdir().unwrap();
    let options = FileSinkOptions::builder()
        .log_directory(dir.path())
        .batch_size(2)
        .flush_period(Duration::from_secs(3600))
        .build()
        .unwrap();
    let flush = file_loop(&options);
    flush.start().unwrap();

    let producer = flush.producer();
    for i in 0..5 {
        producer.enqueue(record(1, i, &format!("line {i}\n")));
    }
    flush.stop().await;

    assert_eq!(flush.state(), LoopState::Stopped);
    let contents = fs::read_to_string(dir.path().join("logs-20240301.txt")).unwrap();
    assert_eq!(contents, "line 0\nline 1\nline 2\nline 3\nline 4\n");
}

#[tokio::test]
async fn periodic_flush_writes_without_stop() {
    let dir = tempdir().unwrap();
    let options = FileSinkOptions::builder()
        .log_directory(dir.path())
        .file_name_prefix("svc-")
        .flush_period(Duration::from_millis(20))
        .build()
        .unwrap();
    let flush = file_loop(&options);
    flush.start().unwrap();
    flush.producer().enqueue(record(2, 0, "tick\n"));

    let path = dir.path().join("svc-20240302.txt");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !path.exists() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "tick\n");
    flush.stop().await;
}

#[tokio::test]
async fn size_limit_and_retention_apply_through_the_loop() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("logs-20240301.txt"), "x".repeat(64)).unwrap();
    fs::write(dir.path().join("logs-20240302.txt"), "").unwrap();
    let options = FileSinkOptions::builder()
        .log_directory(dir.path())
        .file_size_limit(Some(32))
        .retained_file_count(Some(2))
        .build()
        .unwrap();
    let flush = file_loop(&options);

    let producer = flush.producer();
    producer.enqueue(record(2, 0, "over limit day stays small\n"));
    producer.enqueue(record(3, 0, "new day\n"));
    flush.flush().await;

    assert!(!dir.path().join("logs-20240301.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("logs-20240302.txt")).unwrap(),
        "over limit day stays small\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("logs-20240303.txt")).unwrap(),
        "new day\n"
    );

    // A late record for an older day is written, then rotated away.
    producer.enqueue(record(1, 5, "late\n"));
    flush.flush().await;
    assert!(!dir.path().join("logs-20240301.txt").exists());
}

#[tokio::test]
async fn bounded_queue_drops_overflow_silently() {
    let dir = tempdir().unwrap();
    let options = FileSinkOptions::builder()
        .log_directory(dir.path())
        .queue_capacity(Some(3))
        .build()
        .unwrap();
    let flush = file_loop(&options);

    let producer = flush.producer();
    for i in 0..10 {
        producer.enqueue(record(4, i, &format!("{i}\n")));
    }
    flush.flush().await;

    let stats = producer.stats();
    assert_eq!((stats.enqueued, stats.dropped), (3, 7));
    assert_eq!(
        fs::read_to_string(dir.path().join("logs-20240304.txt")).unwrap(),
        "0\n1\n2\n"
    );
}
