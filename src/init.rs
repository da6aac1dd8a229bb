use crate::file_sink::FileSink;
use crate::flush::{FlushLoop, FlushLoopError};
use crate::layer::FileLogLayer;
use crate::options::FileSinkOptions;
use crate::queue::LogProducer;
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

/// Конфигурация слоя логирования.
///
/// Управляет минимальным уровнем событий, которые попадают в файловый
/// sink, а также тем, нужно ли дополнительно печатать логи в консоль
/// через `fmt`‑слой.
///
/// **Поля**
/// - `min_level`: самый подробный уровень, который ещё пишется в файл.
/// - `enable_stdout`: если `true`, поверх `FileLogLayer` добавляется
///   `tracing_subscriber::fmt::Layer` для событий приложения.
///
/// Диагностика самого sink’а (ошибки записи, таймаут остановки) всегда
/// уходит в stderr через [`diagnostics_layer`], независимо от этих полей.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    FlushLoop(#[from] FlushLoopError),
    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Owner of the running file sink returned by [`init_tracing`].
///
/// Call [`SinkGuard::shutdown`] during orderly shutdown; records still
/// queued when the process exits without it are lost.
pub struct SinkGuard {
    flush: Arc<FlushLoop>,
}

impl SinkGuard {
    pub fn new(flush: Arc<FlushLoop>) -> Self {
        SinkGuard { flush }
    }

    pub fn flush_loop(&self) -> &Arc<FlushLoop> {
        &self.flush
    }

    pub fn producer(&self) -> LogProducer {
        self.flush.producer()
    }

    /// Final flush and stop of the background loop. Returns the number of
    /// records lost to the shutdown timeout.
    pub async fn shutdown(self) -> usize {
        self.flush.stop().await
    }
}

/// Initialize global `tracing` subscriber writing into daily files
/// configured by `options`.
///
/// **Parameters**
/// - `options`: validated [`FileSinkOptions`].
/// - `config`: [`LayerConfig`] controlling level filtering and console
///   output.
///
/// **Effects**
///
/// Starts the [`FlushLoop`] on the current Tokio runtime and installs a
/// [`Registry`] combined with [`FileLogLayer`] as the global default
/// subscriber.
pub fn init_tracing_with_config(
    options: FileSinkOptions,
    config: LayerConfig,
) -> Result<SinkGuard, InitError> {
    let sink = Arc::new(FileSink::new(&options));
    let flush = Arc::new(FlushLoop::new(sink, options.sink().clone()));
    let layer = FileLogLayer::new(flush.producer(), config.min_level);
    // Dropping `flush` on an error below also ends the task it spawned.
    flush.start()?;

    // Диагностика sink’а печатается только `diagnostics_layer`, не дублируется в stdout.
    if config.enable_stdout {
        let app_events = Targets::new()
            .with_default(LevelFilter::from_level(config.min_level))
            .with_target(crate::CRATE_TARGET, LevelFilter::OFF);
        let fmt_layer = tracing_subscriber::fmt::layer().with_filter(app_events);
        let subscriber = Registry::default()
            .with(layer)
            .with(fmt_layer)
            .with(diagnostics_layer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default()
            .with(layer)
            .with(diagnostics_layer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(SinkGuard::new(flush))
}

/// Fallback channel for the sink's own warnings: write failures, size-limit
/// drops and shutdown timeouts.
///
/// Only events from this crate at `WARN` or above pass, whatever level the
/// application logs at. [`FileLogLayer`] ignores the same events, so they
/// never end up in the sink they describe.
pub fn diagnostics_layer<S, W>(make_writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(make_writer)
        .with_ansi(false)
        .with_filter(Targets::new().with_target(crate::CRATE_TARGET, Level::WARN))
}

/// Initialize tracing with sensible defaults.
///
/// **Behavior**
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`]. This is the recommended entrypoint for
/// typical services.
pub fn init_tracing(options: FileSinkOptions) -> Result<SinkGuard, InitError> {
    init_tracing_with_config(options, LayerConfig::default())
}
