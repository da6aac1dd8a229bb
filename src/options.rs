use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 10 * 1024 * 1024;
pub const DEFAULT_RETAINED_FILE_COUNT: usize = 3;
pub const DEFAULT_FILE_NAME_PREFIX: &str = "logs-";
pub const DEFAULT_LOG_DIRECTORY: &str = "Logs";

/// Error returned when a sink option is out of range.
///
/// Validation happens once, when options are built; a running sink never
/// reports configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("flush period must be positive")]
    NonPositiveFlushPeriod,
    #[error("shutdown timeout must be positive")]
    NonPositiveShutdownTimeout,
    #[error("background queue size must be non-negative, got {0}")]
    NegativeQueueCapacity(i64),
    #[error("batch size must be positive, got {0}")]
    NonPositiveBatchSize(i64),
    #[error("file size limit must be positive, got {0}")]
    NonPositiveFileSizeLimit(i64),
    #[error("retained file count must be positive, got {0}")]
    NonPositiveRetainedFileCount(i64),
    #[error("file name prefix must not be empty")]
    EmptyFileNamePrefix,
    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("malformed sink settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Batching behaviour shared by every sink: how often the queue is drained,
/// how large it may grow and how drained records are chunked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkOptions {
    flush_period: Duration,
    queue_capacity: Option<usize>,
    batch_size: usize,
    shutdown_timeout: Duration,
}

impl SinkOptions {
    pub fn builder() -> SinkOptionsBuilder {
        SinkOptionsBuilder::default()
    }

    pub fn flush_period(&self) -> Duration {
        self.flush_period
    }

    /// `None` means the queue is unbounded.
    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue_capacity
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Upper bound on the final drain performed by `stop()`.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl Default for SinkOptions {
    fn default() -> Self {
        SinkOptions {
            flush_period: DEFAULT_FLUSH_PERIOD,
            queue_capacity: None,
            batch_size: DEFAULT_BATCH_SIZE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SinkOptionsBuilder {
    options: SinkOptions,
}

impl SinkOptionsBuilder {
    pub fn flush_period(mut self, period: Duration) -> Self {
        self.options.flush_period = period;
        self
    }

    pub fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.options.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SinkOptions, ConfigError> {
        let options = self.options;
        if options.flush_period.is_zero() {
            return Err(ConfigError::NonPositiveFlushPeriod);
        }
        if options.shutdown_timeout.is_zero() {
            return Err(ConfigError::NonPositiveShutdownTimeout);
        }
        if options.batch_size == 0 {
            return Err(ConfigError::NonPositiveBatchSize(0));
        }
        Ok(options)
    }
}

/// Options of the file-backed sink: the batching options plus the on-disk
/// layout and its limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSinkOptions {
    sink: SinkOptions,
    file_size_limit: Option<u64>,
    retained_file_count: Option<usize>,
    file_name_prefix: String,
    log_directory: PathBuf,
}

impl FileSinkOptions {
    pub fn builder() -> FileSinkOptionsBuilder {
        FileSinkOptionsBuilder::default()
    }

    pub fn sink(&self) -> &SinkOptions {
        &self.sink
    }

    /// Files larger than this many bytes stop receiving records.
    pub fn file_size_limit(&self) -> Option<u64> {
        self.file_size_limit
    }

    /// How many of the newest files survive rotation; `None` keeps all.
    pub fn retained_file_count(&self) -> Option<usize> {
        self.retained_file_count
    }

    pub fn file_name_prefix(&self) -> &str {
        &self.file_name_prefix
    }

    pub fn log_directory(&self) -> &Path {
        &self.log_directory
    }
}

impl Default for FileSinkOptions {
    fn default() -> Self {
        FileSinkOptions {
            sink: SinkOptions::default(),
            file_size_limit: Some(DEFAULT_FILE_SIZE_LIMIT),
            retained_file_count: Some(DEFAULT_RETAINED_FILE_COUNT),
            file_name_prefix: DEFAULT_FILE_NAME_PREFIX.to_string(),
            log_directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FileSinkOptionsBuilder {
    sink: SinkOptionsBuilder,
    file_size_limit: Option<u64>,
    retained_file_count: Option<usize>,
    file_name_prefix: String,
    log_directory: PathBuf,
}

impl Default for FileSinkOptionsBuilder {
    fn default() -> Self {
        let defaults = FileSinkOptions::default();
        FileSinkOptionsBuilder {
            sink: SinkOptionsBuilder::default(),
            file_size_limit: defaults.file_size_limit,
            retained_file_count: defaults.retained_file_count,
            file_name_prefix: defaults.file_name_prefix,
            log_directory: defaults.log_directory,
        }
    }
}

impl FileSinkOptionsBuilder {
    pub fn flush_period(mut self, period: Duration) -> Self {
        self.sink = self.sink.flush_period(period);
        self
    }

    pub fn queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.sink = self.sink.queue_capacity(capacity);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.sink = self.sink.batch_size(batch_size);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.sink = self.sink.shutdown_timeout(timeout);
        self
    }

    pub fn file_size_limit(mut self, limit: Option<u64>) -> Self {
        self.file_size_limit = limit;
        self
    }

    pub fn retained_file_count(mut self, count: Option<usize>) -> Self {
        self.retained_file_count = count;
        self
    }

    pub fn file_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_name_prefix = prefix.into();
        self
    }

    pub fn log_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.log_directory = directory.into();
        self
    }

    pub fn build(self) -> Result<FileSinkOptions, ConfigError> {
        let sink = self.sink.build()?;
        if self.file_size_limit == Some(0) {
            return Err(ConfigError::NonPositiveFileSizeLimit(0));
        }
        if self.retained_file_count == Some(0) {
            return Err(ConfigError::NonPositiveRetainedFileCount(0));
        }
        if self.file_name_prefix.is_empty() {
            return Err(ConfigError::EmptyFileNamePrefix);
        }
        Ok(FileSinkOptions {
            sink,
            file_size_limit: self.file_size_limit,
            retained_file_count: self.retained_file_count,
            file_name_prefix: self.file_name_prefix,
            log_directory: self.log_directory,
        })
    }
}

/// Unvalidated file sink settings as they appear in a JSON configuration
/// section or in the environment.
///
/// Absent fields keep their defaults. For `fileSizeLimit` and
/// `retainedFileCount` an explicit `null` removes the limit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSinkSettings {
    pub flush_period_ms: Option<i64>,
    pub background_queue_size: Option<i64>,
    pub batch_size: Option<i64>,
    pub shutdown_timeout_ms: Option<i64>,
    #[serde(deserialize_with = "explicit_null")]
    pub file_size_limit: Option<Option<i64>>,
    #[serde(deserialize_with = "explicit_null")]
    pub retained_file_count: Option<Option<i64>>,
    pub file_name: Option<String>,
    pub log_directory: Option<PathBuf>,
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl FileSinkSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl TryFrom<FileSinkSettings> for FileSinkOptions {
    type Error = ConfigError;

    fn try_from(settings: FileSinkSettings) -> Result<Self, Self::Error> {
        let mut builder = FileSinkOptions::builder();

        if let Some(ms) = settings.flush_period_ms {
            if ms <= 0 {
                return Err(ConfigError::NonPositiveFlushPeriod);
            }
            builder = builder.flush_period(Duration::from_millis(ms as u64));
        }
        if let Some(size) = settings.background_queue_size {
            let capacity =
                usize::try_from(size).map_err(|_| ConfigError::NegativeQueueCapacity(size))?;
            builder = builder.queue_capacity(Some(capacity));
        }
        if let Some(size) = settings.batch_size {
            if size <= 0 {
                return Err(ConfigError::NonPositiveBatchSize(size));
            }
            builder = builder.batch_size(size as usize);
        }
        if let Some(ms) = settings.shutdown_timeout_ms {
            if ms <= 0 {
                return Err(ConfigError::NonPositiveShutdownTimeout);
            }
            builder = builder.shutdown_timeout(Duration::from_millis(ms as u64));
        }
        if let Some(limit) = settings.file_size_limit {
            let limit = match limit {
                Some(bytes) if bytes <= 0 => {
                    return Err(ConfigError::NonPositiveFileSizeLimit(bytes))
                }
                other => other.map(|bytes| bytes as u64),
            };
            builder = builder.file_size_limit(limit);
        }
        if let Some(count) = settings.retained_file_count {
            let count = match count {
                Some(n) if n <= 0 => return Err(ConfigError::NonPositiveRetainedFileCount(n)),
                other => other.map(|n| n as usize),
            };
            builder = builder.retained_file_count(count);
        }
        if let Some(prefix) = settings.file_name {
            builder = builder.file_name_prefix(prefix);
        }
        if let Some(directory) = settings.log_directory {
            builder = builder.log_directory(directory);
        }

        builder.build()
    }
}
