//! Run configuration and the fixed file locations next to the program.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DriveError, Result};
use crate::url_parser::parse_folder_id;

/// File holding the JSON run configuration.
pub const CONFIG_FILE: &str = "config";

/// Persisted OAuth credential.
pub const TOKEN_FILE: &str = "token.json";

/// OAuth client registration downloaded from Google Cloud Console.
pub const CLIENT_SECRET_FILE: &str = "credentials.json";

/// Subdirectory receiving the per-run log files.
pub const LOG_DIR: &str = "logs";

/// Locations of every file the tool reads or writes besides downloads.
#[derive(Debug, Clone)]
pub struct AppPaths {
    base_dir: PathBuf,
}

impl AppPaths {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Use `base_dir` when given, else the directory of the running executable.
    pub fn resolve(base_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = base_dir {
            return Ok(Self::new(dir));
        }
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::new(dir))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE)
    }

    pub fn token_file(&self) -> PathBuf {
        self.base_dir.join(TOKEN_FILE)
    }

    pub fn client_secret_file(&self) -> PathBuf {
        self.base_dir.join(CLIENT_SECRET_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join(LOG_DIR)
    }
}

/// Raw config document; both keys are required but validated after parsing
/// so a missing key gets a readable message.
#[derive(Debug, Deserialize)]
struct RawConfig {
    google_drive_folder_id: Option<String>,
    download_directory: Option<String>,
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Folder ID, already extracted from a URL if one was configured.
    pub folder_id: String,
    pub download_directory: PathBuf,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DriveError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;

        let folder = raw
            .google_drive_folder_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing_key("google_drive_folder_id"))?;
        let download_directory = raw
            .download_directory
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing_key("download_directory"))?;

        Ok(Self {
            folder_id: parse_folder_id(&folder)?,
            download_directory: PathBuf::from(download_directory),
        })
    }
}

fn missing_key(key: &str) -> DriveError {
    DriveError::ConfigError(format!("missing required key \"{}\"", key))
}
