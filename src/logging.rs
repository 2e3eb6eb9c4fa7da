//! Log setup: a timestamped file per run plus the console.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Level used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Name of the log file for a run started now.
pub fn log_file_name() -> String {
    format!("gdrive_download_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber writing to `log_dir` and stderr.
///
/// Keep the returned guard alive for the whole run; dropping it flushes the
/// file writer.
pub fn init(log_dir: &Path) -> Result<(WorkerGuard, PathBuf)> {
    fs::create_dir_all(log_dir)?;
    let file_name = log_file_name();
    let log_path = log_dir.join(&file_name);

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, &file_name));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
    {
        eprintln!(
            "Logging already initialized, {} will stay empty: {}",
            log_path.display(),
            e
        );
    }

    Ok((guard, log_path))
}
