//! Per-file download with size-based skip of already mirrored files.

use std::io;
use std::path::{Component, Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::{info, warn};

use crate::client::{DownloadProgress, DriveClient};
use crate::error::{DriveError, Result};
use crate::models::RemoteFile;

const BAR_TEMPLATE: &str =
    "{msg:30} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30} {bytes} ({bytes_per_sec})";

/// What happened to a single remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Content was fetched and written.
    Downloaded,
    /// A local file with the remote size already exists.
    AlreadySynced,
    /// The entry has no raw content to mirror (folder, Google-native doc).
    Skipped,
}

/// Mirrors remote files into one local directory.
pub struct FileSynchronizer<'a> {
    client: &'a DriveClient,
    destination: PathBuf,
    show_progress: bool,
}

impl<'a> FileSynchronizer<'a> {
    pub fn new<P: Into<PathBuf>>(client: &'a DriveClient, destination: P) -> Self {
        Self {
            client,
            destination: destination.into(),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Bring one remote entry up to date locally.
    ///
    /// An existing local file is kept when its size equals the remote size.
    /// If the size check itself fails the file is downloaded again. A local
    /// entry that is not a regular file (a directory) is an error.
    pub async fn sync_file(&self, file: &RemoteFile) -> Result<SyncOutcome> {
        if file.is_folder() {
            info!("Skipping sub-folder {}", file.name);
            return Ok(SyncOutcome::Skipped);
        }
        if file.is_google_native() {
            warn!(
                "Skipping {}: Google-native documents have no downloadable content",
                file.name
            );
            return Ok(SyncOutcome::Skipped);
        }

        let full_path = self.local_path(&file.name)?;

        if let Ok(metadata) = fs::metadata(&full_path).await {
            if !metadata.is_file() {
                return Err(DriveError::IoError(io::Error::other(format!(
                    "{} exists and is not a regular file",
                    full_path.display()
                ))));
            }
            info!("File {} already exists. Checking integrity...", file.name);
            match self.matches_remote_size(file, metadata.len()).await {
                Ok(true) => {
                    info!("File {} verified by size. Skipping download.", file.name);
                    return Ok(SyncOutcome::AlreadySynced);
                }
                Ok(false) => warn!("File {} size mismatch. Re-downloading.", file.name),
                Err(e) => warn!(
                    "Error checking file {}: {}. Will download again.",
                    file.name, e
                ),
            }
        }

        self.download(file, &full_path).await?;
        info!("Successfully downloaded {}", file.name);
        Ok(SyncOutcome::Downloaded)
    }

    /// Destination path for a remote name, which must be one plain component.
    pub fn local_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {
                Ok(self.destination.join(name))
            }
            _ => Err(DriveError::InvalidFileName(name.to_string())),
        }
    }

    async fn matches_remote_size(&self, file: &RemoteFile, local_size: u64) -> Result<bool> {
        let remote_size = self.client.get_file_size(&file.id).await?;
        Ok(local_size == remote_size)
    }

    async fn download(&self, file: &RemoteFile, path: &Path) -> Result<()> {
        let bar = self.progress_bar(&file.name);

        let result = self
            .client
            .download(&file.id, |event| match event {
                DownloadProgress::Started { total } => {
                    if let Some(total) = total.or(file.size) {
                        bar.set_length(total);
                        bar.set_style(bar_style(BAR_TEMPLATE));
                    }
                }
                DownloadProgress::Chunk(len) => bar.inc(len),
            })
            .await;

        let buffer = match result {
            Ok(buffer) => {
                bar.finish();
                buffer
            }
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        };

        fs::write(path, &buffer).await?;
        Ok(())
    }

    fn progress_bar(&self, name: &str) -> ProgressBar {
        let bar = if self.show_progress {
            ProgressBar::no_length()
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(bar_style(SPINNER_TEMPLATE));
        bar.set_message(name.to_string());
        bar
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
