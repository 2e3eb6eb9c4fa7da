//! drive_mirror - Mirror one Google Drive folder into a local directory.
//!
//! This library provides functionality to:
//! - Authenticate with OAuth2, caching and refreshing the credential on disk
//! - List the files in a Drive folder
//! - Download files that are missing locally or whose size differs
//!
//! # Example
//!
//! ```no_run
//! use drive_mirror::{Authenticator, DriveClient, FileSynchronizer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::new("token.json", "credentials.json");
//!     auth.authenticate().await?;
//!     let client = DriveClient::new(auth);
//!
//!     let files = client.list_folder("folder-id").await?;
//!     let sync = FileSynchronizer::new(&client, "downloads");
//!     for file in &files {
//!         println!("{}: {:?}", file.name, sync.sync_file(file).await?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod runner;
pub mod sync;
pub mod url_parser;

// Re-exports for convenience
pub use auth::{Authenticator, CredentialState};
pub use client::DriveClient;
pub use config::{AppPaths, Config};
pub use error::{DriveError, Result};
pub use models::{Credential, RemoteFile};
pub use runner::{run, RunOptions, SyncReport, SyncResult};
pub use sync::{FileSynchronizer, SyncOutcome};
