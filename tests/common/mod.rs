//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use drive_mirror::{Authenticator, Credential, DriveClient};
use serde_json::json;

pub const ACCESS_TOKEN: &str = "test-token";

pub fn credential(token_uri: &str, expiry: DateTime<Utc>, refresh_token: Option<&str>) -> Credential {
    Credential {
        token: ACCESS_TOKEN.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        token_uri: token_uri.to_string(),
        client_id: "test-client.apps.googleusercontent.com".to_string(),
        client_secret: "test-secret".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
        expiry: Some(expiry),
    }
}

pub fn write_token(dir: &Path, credential: &Credential) {
    let json = serde_json::to_string_pretty(credential).unwrap();
    fs::write(dir.join("token.json"), json).unwrap();
}

/// Writes a token valid for another hour, so no token endpoint is contacted.
pub fn write_valid_token(dir: &Path) {
    let cred = credential(
        "http://127.0.0.1:9/token",
        Utc::now() + Duration::hours(1),
        Some("refresh"),
    );
    write_token(dir, &cred);
}

pub fn write_config(dir: &Path, folder: &str, download_dir: &Path) {
    let config = json!({
        "google_drive_folder_id": folder,
        "download_directory": download_dir,
    });
    fs::write(dir.join("config"), config.to_string()).unwrap();
}

pub fn authenticator(dir: &Path) -> Authenticator {
    Authenticator::new(dir.join("token.json"), dir.join("credentials.json"))
}

/// A client authenticated from a freshly written token, talking to `base_url`.
pub async fn client(dir: &Path, base_url: &str) -> DriveClient {
    write_valid_token(dir);
    let auth = authenticator(dir);
    auth.authenticate().await.unwrap();
    DriveClient::new(auth).with_base_url(base_url)
}

pub fn file_json(id: &str, name: &str, size: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "size": size.to_string(),
        "mimeType": "application/octet-stream"
    })
}
