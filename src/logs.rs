//! Per-run files: the durable service log and the service data directory.

use anyhow::Context;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tracing::info;

/// `<YYYY-MM-DD_HH-MM-SS>.log` for the run start time.
pub fn log_file_name(started_at: DateTime<Local>) -> String {
    started_at.format("%Y-%m-%d_%H-%M-%S.log").to_string()
}

/// Create `logs_dir` if needed and open the run's log file for appending.
pub async fn open_log_sink(
    logs_dir: &Path,
    started_at: DateTime<Local>,
) -> anyhow::Result<(PathBuf, File)> {
    fs::create_dir_all(logs_dir)
        .await
        .with_context(|| format!("Failed to create logs directory {}", logs_dir.display()))?;

    let path = logs_dir.join(log_file_name(started_at));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    info!("Writing service logs to {}", path.display());
    Ok((path, file))
}

/// Remove `data_dir` and everything in it, then recreate it empty.
pub async fn reset_data_dir(data_dir: &Path) -> anyhow::Result<()> {
    match fs::remove_dir_all(data_dir).await {
        Ok(()) => info!("Removed data directory {}", data_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to remove data directory {}", data_dir.display())
            })
        }
    }
    fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))
}
