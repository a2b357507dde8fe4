//! Tracing setup.
//!
//! Events go to stderr and, without ANSI colors, to an operational log in
//! `<log_dir>`. The log rolls daily as `file-ops.<date>.log` and only the
//! newest [`MAX_LOG_FILES`] files are kept.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the operational log.
pub const LOG_FILE_PREFIX: &str = "file-ops";

/// File name suffix of the operational log.
pub const LOG_FILE_SUFFIX: &str = "log";

/// Number of rolled log files kept on disk.
pub const MAX_LOG_FILES: usize = 5;

/// Filter directive used when `RUST_LOG` is not set.
pub fn filter_directive(level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        level.to_lowercase()
    }
}

/// Open the rolling operational log in `log_dir`.
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the lifetime of the process.
pub fn init(level: &str, verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    let directive = filter_directive(level, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging to {}/{}.<date>.{}",
        log_dir.display(),
        LOG_FILE_PREFIX,
        LOG_FILE_SUFFIX
    );

    Ok(guard)
}
