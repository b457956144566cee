use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cache_store::app_cache_dir;

const LOG_FILE: &str = "cp_leaderboard.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Logs to stderr. Used by the non-interactive entry points.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs to a file so the terminal UI is not overwritten. Returns the path in
/// use, or `None` when no cache directory exists (logging is then disabled).
pub fn init_file() -> Result<Option<PathBuf>> {
    let Some(dir) = app_cache_dir() else {
        return Ok(None);
    };
    let path = dir.join(LOG_FILE);
    init_file_at(&path)?;
    Ok(Some(path))
}

pub fn init_file_at(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}
