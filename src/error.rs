//! Error types for the drive_mirror crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while mirroring a Google Drive folder.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("No client secret file found at {0}. Please download it from Google Cloud Console.")]
    MissingClientSecret(PathBuf),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid folder URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Refusing to write file with unsafe name: {0:?}")]
    InvalidFileName(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
