//! File-based logging setup.
//!
//! Log lines go to a daily-rotated file, never to stdout (the terminal
//! belongs to build output and operator feedback). The returned guard must be
//! held for the life of the process or buffered lines are lost.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub fn init(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory '{}'", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "kernelctl.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kernelctl=info")),
        )
        .with_ansi(false)
        .init();

    Ok(guard)
}
