//! Logging system with file output and log rotation.
//!
//! Structured logging with both console and file output. Log files are
//! rotated daily and files older than the retention window are removed
//! at startup.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "bwt-bridge.log";

/// Initialize the logging system with both console and file output.
///
/// `level` is the base filter from the config file; `verbose` raises it
/// to debug; `RUST_LOG` wins over both.
pub fn init_logging(
    log_dir: &Path,
    retention_days: u64,
    verbose: bool,
    level: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(log_dir)?;
    clean_old_logs(log_dir, retention_days)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the guard alive for the program lifetime.
    let _ = Box::leak(Box::new(Arc::new(guard)));

    let base = if verbose {
        "debug"
    } else {
        level.unwrap_or("info")
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(io::stdout)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_timer(LocalTimeTimer),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_timer(LocalTimeTimer),
        );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set default subscriber: {}", e))?;

    // Bridge log:: macros to tracing.
    tracing_log::LogTracer::init()
        .map_err(|e| format!("Failed to initialize LogTracer: {}", e))?;

    Ok(())
}

/// Remove log files older than the retention window.
fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.contains(LOG_FILE_NAME))
            .unwrap_or(false);
        if !is_ours {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified: chrono::DateTime<Local> = modified.into();
                if modified < cutoff {
                    if let Err(e) = fs::remove_file(&path) {
                        eprintln!("Failed to remove old log file {:?}: {}", path, e);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Local time formatting for log lines.
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}
