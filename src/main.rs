//! drive_mirror CLI - Mirror a Google Drive folder to a local directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use drive_mirror::{logging, run, AppPaths, RunOptions};

/// Download every file of the configured Google Drive folder, skipping files
/// already present with the same size.
///
/// Reads `config`, `token.json` and `credentials.json` from the home
/// directory, which defaults to the directory holding this executable.
#[derive(Parser)]
#[command(name = "drive_mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config, token.json and credentials.json.
    #[arg(long, env = "DRIVE_MIRROR_HOME")]
    home: Option<PathBuf>,

    /// Do not draw per-file progress bars.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = AppPaths::resolve(cli.home).context("Failed to locate the program directory")?;
    let (_guard, log_path) = logging::init(&paths.log_dir())
        .with_context(|| format!("Failed to set up logging in {:?}", paths.log_dir()))?;
    info!("Logging to {}", log_path.display());

    let options = RunOptions {
        show_progress: !cli.no_progress,
        ..RunOptions::default()
    };

    // Per-file failures are reported in the summary, not through the exit code.
    if let Err(e) = run(&paths, &options).await {
        error!("Error in main process: {}", e);
        return Err(e).context("Mirroring aborted");
    }

    Ok(())
}
