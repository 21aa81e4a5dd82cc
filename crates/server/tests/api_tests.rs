use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::Value;

use stowage_blob::BlobStore;
use stowage_metadata::MetadataStore;
use stowage_metadata_memory::MemoryMetadataStore;
use stowage_server::api::{router, AppState};
use stowage_service::{FileService, FileServiceConfig};

fn test_server(max_file_size: u64) -> (tempfile::TempDir, TestServer) {
    let dir = tempfile::tempdir().expect("tempdir");
    let metadata = Arc::new(MemoryMetadataStore::new()) as Arc<dyn MetadataStore>;
    let blobs = BlobStore::new(dir.path().join("blobs"));
    let service = Arc::new(FileService::new(
        metadata,
        blobs,
        FileServiceConfig { max_file_size },
    ));
    let server = TestServer::new(router(AppState { service })).expect("test server");
    (dir, server)
}

fn upload_form(name: &str, payload: &'static [u8]) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(payload).file_name(name))
}

#[tokio::test]
async fn upload_get_download_delete_flow() {
    let (_dir, server) = test_server(1024);

    let res = server
        .post("/v1/files")
        .multipart(upload_form("a.txt", b"hello world"))
        .await;
    res.assert_status(StatusCode::CREATED);
    let created: Value = res.json();
    let id = created["id"].as_str().expect("id").to_owned();
    assert_eq!(created["name"], "a.txt");
    assert_eq!(created["size"], 11);

    let res = server.get(&format!("/v1/files/{id}")).await;
    res.assert_status(StatusCode::OK);
    let meta: Value = res.json();
    assert_eq!(meta["name"], "a.txt");
    assert_eq!(meta["size"], 11);

    let res = server.get(&format!("/v1/files/{id}/download")).await;
    res.assert_status(StatusCode::OK);
    assert_eq!(res.as_bytes().as_ref(), b"hello world");
    let disposition = res
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .expect("content-disposition");
    assert!(disposition.contains("a.txt"));

    let res = server.delete(&format!("/v1/files/{id}")).await;
    res.assert_status(StatusCode::OK);

    // Every subsequent access is a 404.
    server
        .get(&format!("/v1/files/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/v1/files/{id}/download"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/v1/files/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let (_dir, server) = test_server(1024);
    let res = server.get("/v1/files/no-such-id").await;
    res.assert_status(StatusCode::NOT_FOUND);
    let body: Value = res.json();
    assert_eq!(body["error"], "file not found");
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let (_dir, server) = test_server(1024);
    let form = MultipartForm::new().add_part("notes", Part::bytes(&b"text"[..]));
    let res = server.post("/v1/files").multipart(form).await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_bad_request() {
    let (_dir, server) = test_server(8);
    let res = server
        .post("/v1/files")
        .multipart(upload_form("big.bin", &[0u8; 100]))
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_date_is_bad_request() {
    let (_dir, server) = test_server(1024);

    let res = server.get("/v1/files/search/2024-13-99/2024-01-01").await;
    res.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = res.json();
    assert!(body["error"].as_str().expect("error").contains("YYYY-MM-DD"));

    server
        .delete("/v1/files/range/not-a-date/2024-01-01")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_and_range_delete_cover_todays_uploads() {
    let (_dir, server) = test_server(1024);

    for name in ["one.txt", "two.txt"] {
        server
            .post("/v1/files")
            .multipart(upload_form(name, b"data"))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let res = server
        .get(&format!("/v1/files/search/{today}/{today}"))
        .await;
    res.assert_status(StatusCode::OK);
    let body: Value = res.json();
    assert_eq!(body["count"], 2);

    let res = server
        .delete(&format!("/v1/files/range/{today}/{today}"))
        .await;
    res.assert_status(StatusCode::OK);
    let body: Value = res.json();
    assert_eq!(body["count"], 2);
    for item in body["results"].as_array().expect("results") {
        assert!(item.get("error").is_none(), "all deletions should succeed");
    }

    let res = server
        .get(&format!("/v1/files/search/{today}/{today}"))
        .await;
    let body: Value = res.json();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (_dir, server) = test_server(1024);
    let res = server.get("/health").await;
    res.assert_status(StatusCode::OK);
    let body: Value = res.json();
    assert_eq!(body["status"], "ok");
}
