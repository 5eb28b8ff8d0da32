//! Logging setup with built-in log rotation using tracing-appender.
//!
//! File logging rotates on its own, no external logrotate needed, which
//! keeps long-running dashboard sessions from filling the disk.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Rotation period for log files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationPeriod {
    /// Rotate log files every hour.
    Hourly,
    /// Rotate log files every day (default).
    #[default]
    Daily,
    /// Never rotate log files.
    Never,
}

impl std::str::FromStr for RotationPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" | "hour" => Ok(RotationPeriod::Hourly),
            "daily" | "day" => Ok(RotationPeriod::Daily),
            "never" | "none" => Ok(RotationPeriod::Never),
            _ => Err(format!(
                "Invalid rotation period '{}'. Valid options: hourly, daily, never",
                s
            )),
        }
    }
}

impl From<RotationPeriod> for Rotation {
    fn from(period: RotationPeriod) -> Self {
        match period {
            RotationPeriod::Hourly => Rotation::HOURLY,
            RotationPeriod::Daily => Rotation::DAILY,
            RotationPeriod::Never => Rotation::NEVER,
        }
    }
}

/// Configuration for file-based logging with rotation.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory where log files will be stored.
    pub log_dir: String,
    /// Prefix for log file names.
    pub prefix: String,
    /// How often to rotate log files.
    pub rotation: RotationPeriod,
    /// Maximum number of log files to keep (0 = unlimited).
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: ".".to_string(),
            prefix: "smartroom".to_string(),
            rotation: RotationPeriod::Daily,
            max_files: 7,
        }
    }
}

/// Guard that must be kept alive to ensure logs are flushed.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Sets up console-only logging, filtered through `RUST_LOG`.
pub fn init_console_logging() -> LogGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    LogGuard { _guard: None }
}

/// Sets up file-based logging with automatic rotation.
///
/// Returns a guard that must be kept alive for the duration of the
/// program; dropping it flushes any buffered log lines.
pub fn init_file_logging(config: LogConfig) -> std::io::Result<LogGuard> {
    let log_dir = Path::new(&config.log_dir);

    // The appender only prunes when it rotates, so leftovers from
    // earlier runs are cleaned up here.
    if config.max_files > 0 {
        prune_old_logs(log_dir, &config.prefix, config.max_files)?;
    }

    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.prefix)
        .filename_suffix("log");
    if config.max_files > 0 {
        builder = builder.max_log_files(config.max_files);
    }
    let file_appender = builder.build(log_dir).map_err(std::io::Error::other)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(LogGuard {
        _guard: Some(guard),
    })
}

/// Removes old log files, keeping only the `max_files` most recent ones.
fn prune_old_logs(log_dir: &Path, prefix: &str, max_files: usize) -> std::io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let mut log_files: Vec<_> = std::fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(prefix) && name.ends_with(".log"))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|mtime| (entry.path(), mtime))
        })
        .collect();

    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            // Logging is not up yet at this point.
            eprintln!("Warning: failed to remove old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}
