use crate::options::FileSinkOptions;
use crate::record::LogRecord;
use crate::sink::{LogSink, WriteError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// [`LogSink`] that appends records to one plain-text file per UTC day.
///
/// Files are named `{prefix}{yyyyMMdd}.txt` inside the log directory. Because
/// the date is zero padded, sorting names as strings sorts them by date,
/// which is what rotation relies on.
///
/// Two sinks pointed at the same directory must not run at the same time.
#[derive(Clone, Debug)]
pub struct FileSink {
    directory: PathBuf,
    prefix: String,
    size_limit: Option<u64>,
    retained_files: Option<usize>,
}

/// Outcome of one [`FileSink::write_records`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Records appended to disk.
    pub written: usize,
    /// Records dropped because their day's file was over the size limit.
    pub skipped: usize,
    /// Files removed by rotation.
    pub deleted: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(options: &FileSinkOptions) -> Self {
        FileSink {
            directory: options.log_directory().to_path_buf(),
            prefix: options.file_name_prefix().to_string(),
            size_limit: options.file_size_limit(),
            retained_files: options.retained_file_count(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file receiving records for `day`.
    pub fn file_path(&self, day: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}{}.txt", self.prefix, day.format("%Y%m%d")))
    }

    /// Blocking implementation of a batch write: group by day, append the
    /// groups whose file is under the size limit, then rotate.
    pub fn write_records(&self, batch: Vec<LogRecord>) -> io::Result<WriteReport> {
        fs::create_dir_all(&self.directory)?;

        let mut report = WriteReport::default();
        for (day, records) in group_by_day(batch) {
            let path = self.file_path(day);
            if self.over_size_limit(&path)? {
                debug!(path = %path.display(), dropped = records.len(), "log file over size limit, skipping day");
                report.skipped += records.len();
                continue;
            }
            append(&path, &records)?;
            report.written += records.len();
        }

        report.deleted = self.roll_files()?;
        Ok(report)
    }

    fn over_size_limit(&self, path: &Path) -> io::Result<bool> {
        let Some(limit) = self.size_limit else {
            return Ok(false);
        };
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len() > limit),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete every file matching the prefix except the newest
    /// `retained_files`.
    fn roll_files(&self) -> io::Result<Vec<PathBuf>> {
        let retained = match self.retained_files {
            Some(n) if n > 0 => n,
            _ => return Ok(Vec::new()),
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if name.starts_with(&self.prefix) {
                    names.push(name);
                }
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));

        let mut deleted = Vec::new();
        for name in names.into_iter().skip(retained) {
            let path = self.directory.join(name);
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed rotated log file");
            deleted.push(path);
        }
        Ok(deleted)
    }
}

fn group_by_day(batch: Vec<LogRecord>) -> BTreeMap<NaiveDate, Vec<LogRecord>> {
    let mut groups: BTreeMap<NaiveDate, Vec<LogRecord>> = BTreeMap::new();
    for record in batch {
        groups.entry(record.day()).or_default().push(record);
    }
    groups
}

// The handle is dropped before any error propagates out of this function.
fn append(path: &Path, records: &[LogRecord]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write_messages(&mut file, records)
}

/// Buffered write of every message. On failure the unflushed tail is
/// discarded instead of being written by `BufWriter`'s drop.
fn write_messages<W: Write>(out: W, records: &[LogRecord]) -> io::Result<()> {
    let mut writer = BufWriter::new(out);
    let result = records
        .iter()
        .try_for_each(|record| writer.write_all(record.message.as_bytes()));
    match result {
        Ok(()) => writer.flush(),
        Err(e) => {
            let _ = writer.into_parts();
            Err(e)
        }
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn write_batch(&self, batch: Vec<LogRecord>) -> Result<(), WriteError> {
        let sink = self.clone();
        let report = tokio::task::spawn_blocking(move || sink.write_records(batch)).await??;
        if report.skipped > 0 {
            warn!(
                skipped = report.skipped,
                "dropped log records for files over the size limit"
            );
        }
        Ok(())
    }
}
