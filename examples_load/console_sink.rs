use std::sync::Arc;
use tokio::time::Duration;

use tracing_file_sink::console_sink::ConsoleSink;
use tracing_file_sink::flush::FlushLoop;
use tracing_file_sink::layer::FileLogLayer;
use tracing_file_sink::options::SinkOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// The same batching pipeline with stdout as the destination.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = SinkOptions::builder()
        .flush_period(Duration::from_millis(100))
        .batch_size(4)
        .build()?;
    let flush = Arc::new(FlushLoop::new(Arc::new(ConsoleSink), options));
    flush.start()?;

    let layer = FileLogLayer::new(flush.producer(), tracing::Level::INFO);
    tracing::subscriber::set_global_default(Registry::default().with(layer))?;

    for i in 0..10 {
        tracing::info!(target: "console_demo", step = i, "batched to stdout");
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    flush.stop().await;
    Ok(())
}
