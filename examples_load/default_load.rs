use std::time::Instant;
use tracing::error;

use tracing_file_sink::env::{env_or, LOG_SINK_DIRECTORY_ENV};
use tracing_file_sink::init::init_tracing;
use tracing_file_sink::options::FileSinkOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = FileSinkOptions::builder()
        .log_directory(env_or(LOG_SINK_DIRECTORY_ENV, "Logs"))
        .build()?;
    let guard = init_tracing(options)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(target: "load", iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let stats = guard.producer().stats();
    guard.shutdown().await;
    println!("enqueued {}, dropped {}", stats.enqueued, stats.dropped);
    Ok(())
}
