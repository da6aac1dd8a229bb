//! Environment variable names used by this crate for convenient
//! configuration of the file sink from services.
//!
//! These are purely helpers; the core sink types remain decoupled from
//! environment access.

use crate::options::{ConfigError, FileSinkOptions, FileSinkSettings};
use std::path::PathBuf;

/// Flush period in milliseconds.
pub const LOG_SINK_FLUSH_PERIOD_MS_ENV: &str = "LOG_SINK_FLUSH_PERIOD_MS";

/// Background queue capacity; unset means unbounded.
pub const LOG_SINK_QUEUE_SIZE_ENV: &str = "LOG_SINK_QUEUE_SIZE";

/// Maximum number of records handed to the writer in one call.
pub const LOG_SINK_BATCH_SIZE_ENV: &str = "LOG_SINK_BATCH_SIZE";

/// Upper bound on the final flush at shutdown, in milliseconds.
pub const LOG_SINK_SHUTDOWN_TIMEOUT_MS_ENV: &str = "LOG_SINK_SHUTDOWN_TIMEOUT_MS";

/// Per-file size limit in bytes; `none` disables the limit.
pub const LOG_SINK_FILE_SIZE_LIMIT_ENV: &str = "LOG_SINK_FILE_SIZE_LIMIT";

/// Number of daily files kept by rotation; `none` keeps every file.
pub const LOG_SINK_RETAINED_FILE_COUNT_ENV: &str = "LOG_SINK_RETAINED_FILE_COUNT";

/// File name prefix, e.g. `logs-`.
pub const LOG_SINK_FILE_NAME_ENV: &str = "LOG_SINK_FILE_NAME";

/// Directory holding the daily files.
pub const LOG_SINK_DIRECTORY_ENV: &str = "LOG_SINK_DIRECTORY";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl FileSinkSettings {
    /// Collect settings from the `LOG_SINK_*` process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Collect settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(FileSinkSettings {
            flush_period_ms: int_var(&lookup, LOG_SINK_FLUSH_PERIOD_MS_ENV)?,
            background_queue_size: int_var(&lookup, LOG_SINK_QUEUE_SIZE_ENV)?,
            batch_size: int_var(&lookup, LOG_SINK_BATCH_SIZE_ENV)?,
            shutdown_timeout_ms: int_var(&lookup, LOG_SINK_SHUTDOWN_TIMEOUT_MS_ENV)?,
            file_size_limit: limit_var(&lookup, LOG_SINK_FILE_SIZE_LIMIT_ENV)?,
            retained_file_count: limit_var(&lookup, LOG_SINK_RETAINED_FILE_COUNT_ENV)?,
            file_name: lookup(LOG_SINK_FILE_NAME_ENV),
            log_directory: lookup(LOG_SINK_DIRECTORY_ENV).map(PathBuf::from),
        })
    }
}

impl FileSinkOptions {
    /// Validated options built from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        FileSinkSettings::from_env()?.try_into()
    }
}

fn int_var<F>(lookup: &F, key: &'static str) -> Result<Option<i64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
    }
}

fn limit_var<F>(lookup: &F, key: &'static str) -> Result<Option<Option<i64>>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.trim().eq_ignore_ascii_case("none") => Ok(Some(None)),
        _ => Ok(int_var(lookup, key)?.map(Some)),
    }
}
