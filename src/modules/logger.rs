use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AppResult;
use crate::modules::config::get_data_dir;

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().to_rfc3339())
    }
}

pub fn get_log_dir() -> AppResult<PathBuf> {
    let log_dir = get_data_dir()?.join("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
    }
    Ok(log_dir)
}

/// Installs the global subscriber: console plus a daily rolling file
/// under the data directory. Safe to call more than once; only the
/// first call wins.
pub fn init_logger() {
    let log_dir = match get_log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("failed to initialize log directory: {}", e);
            return;
        }
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, "quotawatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_level(true)
        .with_timer(LocalTimer);
    let file_layer = fmt::Layer::new()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_timer(LocalTimer);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    // The writer guard must outlive the process for the file layer to flush.
    std::mem::forget(guard);

    if let Err(e) = cleanup_old_logs(7) {
        warn!("failed to clean up old logs: {}", e);
    }
}

/// Deletes rolled log files older than `days_to_keep`.
pub fn cleanup_old_logs(days_to_keep: u64) -> AppResult<()> {
    use std::time::{Duration, SystemTime};

    let log_dir = get_log_dir()?;
    let cutoff = SystemTime::now() - Duration::from_secs(days_to_keep * 24 * 60 * 60);

    let mut deleted = 0usize;
    for entry in fs::read_dir(&log_dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        let modified = metadata.modified().unwrap_or(SystemTime::now());
        if modified < cutoff {
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to delete old log file {:?}: {}", path, e);
            } else {
                deleted += 1;
            }
        }
    }

    if deleted > 0 {
        info!("log cleanup deleted {} expired file(s)", deleted);
    }
    Ok(())
}
