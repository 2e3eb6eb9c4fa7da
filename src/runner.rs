//! End-to-end run: config, authentication, listing, then the download loop.

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::auth::Authenticator;
use crate::client::{DriveClient, DRIVE_API_BASE};
use crate::config::{AppPaths, Config};
use crate::error::{DriveError, Result};
use crate::models::RemoteFile;
use crate::sync::{FileSynchronizer, SyncOutcome};

/// Per-run tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A file whose processing failed, with the error rendered for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub name: String,
    pub error: String,
}

/// Tallies plus the failures folded out of the download loop.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub result: SyncResult,
    pub failures: Vec<FileFailure>,
}

/// Options that do not come from the config document.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Drive API root.
    pub api_base: String,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            show_progress: true,
        }
    }
}

/// Mirror the configured folder.
///
/// Errors before the download loop (config, download directory,
/// authentication, listing) abort the run. Errors for individual files are
/// logged and counted in the returned report.
pub async fn run(paths: &AppPaths, options: &RunOptions) -> Result<SyncReport> {
    let config = Config::from_file(paths.config_file()).inspect_err(|e| {
        error!("Failed to load config: {}", e);
    })?;

    tokio::fs::create_dir_all(&config.download_directory)
        .await
        .map_err(|e| {
            error!(
                "Cannot create download directory {}: {}",
                config.download_directory.display(),
                e
            );
            DriveError::from(e)
        })?;

    info!("Authenticating with Google Drive...");
    let auth = Authenticator::new(paths.token_file(), paths.client_secret_file());
    auth.authenticate().await.inspect_err(|e| {
        error!("Authentication failed: {}", e);
    })?;
    info!("Authenticated.");

    let client = DriveClient::new(auth).with_base_url(options.api_base.as_str());

    info!("Listing files in folder {}...", config.folder_id);
    let files = client.list_folder(&config.folder_id).await.inspect_err(|e| {
        error!("Error listing files in folder: {}", e);
    })?;

    let synchronizer = FileSynchronizer::new(&client, &config.download_directory)
        .with_progress(options.show_progress);

    Ok(sync_all(&synchronizer, &files).await)
}

/// Process every file in order; one file's failure never stops the loop.
pub async fn sync_all(synchronizer: &FileSynchronizer<'_>, files: &[RemoteFile]) -> SyncReport {
    let mut report = SyncReport::default();
    let mut seen = HashSet::new();

    for (i, file) in files.iter().enumerate() {
        info!("Processing file {}/{}: {}", i + 1, files.len(), file);

        if !seen.insert(file.id.as_str()) {
            warn!("File {} was already processed in this run", file.name);
            report.result.skipped += 1;
            continue;
        }

        match synchronizer.sync_file(file).await {
            Ok(SyncOutcome::Downloaded | SyncOutcome::AlreadySynced) => {
                report.result.successful += 1;
            }
            Ok(SyncOutcome::Skipped) => report.result.skipped += 1,
            Err(e) => {
                error!("Error downloading {}: {}", file.name, e);
                report.result.failed += 1;
                report.failures.push(FileFailure {
                    name: file.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let result = report.result;
    info!(
        "Download summary: {} successful, {} failed, {} skipped",
        result.successful, result.failed, result.skipped
    );
    report
}
