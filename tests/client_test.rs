//! Tests for DriveClient with mocked HTTP responses.

mod common;

use drive_mirror::client::DownloadProgress;
use drive_mirror::models::{FileListResponse, RemoteFile};
use drive_mirror::DriveError;
use mockito::{Matcher, Server};
use serde_json::json;

mod models {
    use super::*;

    #[test]
    fn test_remote_file_deserialization() {
        let json = json!({
            "id": "file123",
            "name": "document.pdf",
            "mimeType": "application/pdf",
            "md5Checksum": "9e107d9d372bb6826bd81d3542a419d6",
            "size": "2048"
        });

        let file: RemoteFile = serde_json::from_value(json).unwrap();

        assert_eq!(file.id, "file123");
        assert_eq!(file.name, "document.pdf");
        assert_eq!(file.size, Some(2048));
        assert!(file.md5_checksum.is_some());
    }

    #[test]
    fn test_remote_file_without_size() {
        let json = json!({
            "id": "folder123",
            "name": "My Folder",
            "mimeType": "application/vnd.google-apps.folder"
        });

        let file: RemoteFile = serde_json::from_value(json).unwrap();

        assert_eq!(file.size, None);
        assert!(file.is_folder());
    }

    #[test]
    fn test_file_list_response_deserialization() {
        let json = json!({
            "files": [
                {"id": "f1", "name": "file1.txt"},
                {"id": "f2", "name": "file2.txt"}
            ],
            "nextPageToken": "token123"
        });

        let response: FileListResponse = serde_json::from_value(json).unwrap();

        assert_eq!(response.files.len(), 2);
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_file_list_response_empty() {
        let response: FileListResponse = serde_json::from_value(json!({})).unwrap();

        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }
}

mod list_folder {
    use super::*;

    #[tokio::test]
    async fn test_sorted_by_name_across_pages() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = common::client(dir.path(), &server.url()).await;

        // The first request ends with `fields`; the follow-up appends `pageToken`.
        let first = server
            .mock("GET", "/files")
            .match_query(Matcher::Regex("fields=[^&]*$".to_string()))
            .match_header("authorization", "Bearer test-token")
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "files": [
                        common::file_json("3", "charlie.dat", 30),
                        common::file_json("1", "alpha.dat", 10)
                    ],
                    "nextPageToken": "p2"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [common::file_json("2", "bravo.dat", 20)]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let files = client.list_folder("folder1").await.unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.dat", "bravo.dat", "charlie.dat"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_targets_folder() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = common::client(dir.path(), &server.url()).await;

        let mock = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "'folder1' in parents and trashed = false".into()),
                Matcher::UrlEncoded("supportsAllDrives".into(), "true".into()),
                Matcher::UrlEncoded("pageSize".into(), "1000".into()),
            ]))
            .with_body(json!({"files": []}).to_string())
            .expect(1)
            .create_async()
            .await;

        let files = client.list_folder("folder1").await.unwrap();

        assert!(files.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_returned() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = common::client(dir.path(), &server.url()).await;

        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(json!({"error": {"code": 404, "message": "File not found: folder1."}}).to_string())
            .create_async()
            .await;

        let err = client.list_folder("folder1").await.unwrap_err();

        match err {
            DriveError::ApiError { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("folder1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_text_error_body() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = common::client(dir.path(), &server.url()).await;

        server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("backend unavailable")
            .create_async()
            .await;

        let err = client.list_folder("folder1").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("backend unavailable"));
    }
}

mod metadata_and_media {
    use super::*;

    #[tokio::test]
    async fn test_get_file_size() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = common::client(dir.path(), &server.url()).await;

        server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("fields".into(), "size".into()))
            .with_body(r#"{"size": "1024"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/files/nosize")
            .match_query(Matcher::UrlEncoded("fields".into(), "size".into()))
            .with_body("{}")
            .create_async()
            .await;

        assert_eq!(client.get_file_size("abc").await.unwrap(), 1024);
        assert_eq!(client.get_file_size("nosize").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_download_reports_progress() {
        let mut server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = common::client(dir.path(), &server.url()).await;

        let body: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        server
            .mock("GET", "/files/abc")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_body(body.clone())
            .create_async()
            .await;

        let mut events = Vec::new();
        let content = client
            .download("abc", |event| events.push(event))
            .await
            .unwrap();

        assert_eq!(content, body);
        assert_eq!(events[0], DownloadProgress::Started { total: Some(4096) });
        let streamed: u64 = events
            .iter()
            .filter_map(|e| match e {
                DownloadProgress::Chunk(n) => Some(*n),
                _ => None,
            })
            .sum();
        assert_eq!(streamed, 4096);
    }
}

mod error_handling {
    use drive_mirror::error::DriveError;
    use std::path::PathBuf;

    #[test]
    fn test_error_display() {
        let err = DriveError::ApiError {
            status: 404,
            message: "File not found".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("404"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_missing_client_secret_names_path() {
        let err = DriveError::MissingClientSecret(PathBuf::from("/opt/mirror/credentials.json"));
        assert!(err.to_string().contains("/opt/mirror/credentials.json"));
    }
}
