//! Google Drive API client for read-only folder mirroring.

use futures::StreamExt;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{format_size, ApiErrorResponse, FileListResponse, RemoteFile, SizeResponse};

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Largest page size files.list accepts.
const PAGE_SIZE: &str = "1000";

/// Fields requested for each listed entry.
const LIST_FIELDS: &str = "nextPageToken, files(id, name, size, mimeType, md5Checksum)";

/// Client for the Drive endpoints the mirror needs.
#[derive(Clone)]
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    base_url: String,
}

impl DriveClient {
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            http: Client::new(),
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    /// Point the client at another API root (a mock server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// List every non-trashed entry in a folder, sorted by name.
    ///
    /// Follows `nextPageToken` until the listing is exhausted. An empty
    /// folder is logged and returned as an empty list.
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let query = format!(
            "'{}' in parents and trashed = false",
            folder_id.replace('\'', "\\'")
        );
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.get_access_token().await?;
            let mut request = self
                .http
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("q", query.as_str()),
                    ("pageSize", PAGE_SIZE),
                    ("includeItemsFromAllDrives", "true"),
                    ("supportsAllDrives", "true"),
                    ("fields", LIST_FIELDS),
                ]);

            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let response = check_status(request.send().await?).await?;
            let page: FileListResponse = response.json().await?;
            debug!("Listed page with {} entries", page.files.len());
            files.extend(page.files);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        if files.is_empty() {
            warn!("No files found in the specified folder.");
            return Ok(files);
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        let total: u64 = files.iter().filter_map(|f| f.size).sum();
        info!(
            "Found {} files in the folder ({}).",
            files.len(),
            format_size(total)
        );
        Ok(files)
    }

    /// Fetch the authoritative size of a file. Missing sizes read as zero.
    pub async fn get_file_size(&self, file_id: &str) -> Result<u64> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", "size")])
            .send()
            .await?;

        let metadata: SizeResponse = check_status(response).await?.json().await?;
        Ok(metadata.size.unwrap_or(0))
    }

    /// Download a file's content into memory.
    ///
    /// `on_progress` receives the response's `Content-Length` (if any) before
    /// the first chunk, then each chunk's length as it arrives.
    pub async fn download<F>(&self, file_id: &str, mut on_progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(DownloadProgress),
    {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.base_url, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;
        let response = check_status(response).await?;

        let total = response.content_length();
        on_progress(DownloadProgress::Started { total });

        // Content-Length is untrusted; grow with the bytes actually received.
        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            on_progress(DownloadProgress::Chunk(chunk.len() as u64));
        }

        Ok(buffer)
    }
}

/// Progress events emitted while a download streams in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownloadProgress {
    Started { total: Option<u64> },
    Chunk(u64),
}

/// Turn a non-success response into [`DriveError::ApiError`], preferring the
/// message from Google's error envelope.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}
