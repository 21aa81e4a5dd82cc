use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::io::AsyncReadExt;

use stowage_blob::BlobStore;
use stowage_core::{FileRecord, ObjectId};
use stowage_metadata::{MetadataError, MetadataStore};
use stowage_metadata_memory::MemoryMetadataStore;
use stowage_service::{FileService, FileServiceConfig, FileServiceError};

fn fixture(max_file_size: u64) -> (tempfile::TempDir, Arc<MemoryMetadataStore>, FileService) {
    let dir = tempfile::tempdir().expect("tempdir");
    let metadata = Arc::new(MemoryMetadataStore::new());
    let blobs = BlobStore::new(dir.path().join("blobs"));
    let service = FileService::new(
        Arc::clone(&metadata) as Arc<dyn MetadataStore>,
        blobs,
        FileServiceConfig { max_file_size },
    );
    (dir, metadata, service)
}

fn blobs_of(dir: &tempfile::TempDir) -> BlobStore {
    BlobStore::new(dir.path().join("blobs"))
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
}

#[tokio::test]
async fn upload_then_get_preserves_name_and_size() {
    let (_dir, _metadata, service) = fixture(1024);

    let upload = service
        .upload("a.txt", 11, &b"hello world"[..])
        .await
        .expect("upload should succeed");
    assert_eq!(upload.record.display_name, "a.txt");
    assert_eq!(upload.record.size, 11);

    let record = service.get(&upload.record.id).await.expect("get");
    assert_eq!(record.display_name, "a.txt");
    assert_eq!(record.size, 11);
}

#[tokio::test]
async fn download_round_trips_bytes() {
    let (_dir, _metadata, service) = fixture(1024);

    let payload = b"the quick brown fox";
    let upload = service
        .upload("fox.txt", payload.len() as u64, &payload[..])
        .await
        .expect("upload");

    let (record, mut file) = service.download(&upload.record.id).await.expect("download");
    assert_eq!(record.size, payload.len() as u64);

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await.expect("read blob");
    assert_eq!(bytes, payload);
}

#[tokio::test]
async fn delete_is_idempotent_via_not_found() {
    let (_dir, _metadata, service) = fixture(1024);

    let upload = service.upload("gone.txt", 4, &b"data"[..]).await.expect("upload");
    service.delete(&upload.record.id).await.expect("first delete");

    let second = service.delete(&upload.record.id).await;
    assert!(matches!(second, Err(FileServiceError::NotFound)));

    let lookup = service.get(&upload.record.id).await;
    assert!(matches!(lookup, Err(FileServiceError::NotFound)));
}

#[tokio::test]
async fn oversize_declaration_is_rejected_before_persisting() {
    let (dir, metadata, service) = fixture(10);

    let result = service.upload("big.bin", 11, &[0u8; 11][..]).await;
    assert!(matches!(result, Err(FileServiceError::BadRequest(_))));

    // Neither a blob nor any metadata survives.
    assert!(metadata
        .stale_reservations(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap()
        .is_empty());
    let root = dir.path().join("blobs");
    assert!(!root.exists() || std::fs::read_dir(root).unwrap().next().is_none());
}

#[tokio::test]
async fn exact_max_size_succeeds_one_byte_over_fails() {
    let (dir, metadata, service) = fixture(16);

    let exact = service.upload("exact.bin", 16, &[1u8; 16][..]).await;
    assert!(exact.is_ok(), "exactly max-size upload should succeed");

    // Declared size lies under the cap but the stream runs over it.
    let over = service.upload("over.bin", 16, &[2u8; 17][..]).await;
    assert!(matches!(over, Err(FileServiceError::BadRequest(_))));

    // The failed upload persisted neither blob nor metadata.
    assert!(metadata
        .stale_reservations(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap()
        .is_empty());
    let entries: Vec<_> = std::fs::read_dir(dir.path().join("blobs"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1, "only the successful upload's blob remains");
}

#[tokio::test]
async fn upload_records_actual_bytes_not_declaration() {
    let (_dir, _metadata, service) = fixture(1024);

    // Declared size is an upper-bound hint; the committed size is measured.
    let upload = service
        .upload("short.txt", 100, &b"abc"[..])
        .await
        .expect("upload");
    assert_eq!(upload.record.size, 3);
}

#[tokio::test]
async fn sniffing_does_not_disturb_written_bytes() {
    let (_dir, _metadata, service) = fixture(4096);

    // PNG magic followed by padding well past the sniff window.
    let mut payload = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    payload.resize(1500, 0xAB);

    let upload = service
        .upload("image.png", payload.len() as u64, payload.as_slice())
        .await
        .expect("upload");
    assert_eq!(upload.content_type.as_deref(), Some("image/png"));

    let (_, mut file) = service.download(&upload.record.id).await.expect("download");
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await.expect("read");
    assert_eq!(bytes, payload, "written bytes must include the sniffed prefix");
}

#[tokio::test]
async fn download_of_missing_blob_is_internal_not_not_found() {
    let (dir, _metadata, service) = fixture(1024);

    let upload = service.upload("lost.txt", 4, &b"data"[..]).await.expect("upload");

    // Simulate out-of-band blob loss.
    blobs_of(&dir)
        .remove(&upload.record.stored_name)
        .await
        .expect("remove blob out of band");

    let result = service.download(&upload.record.id).await;
    assert!(matches!(result, Err(FileServiceError::Internal(_))));

    // The record is still discoverable; the read path never heals.
    assert!(service.get(&upload.record.id).await.is_ok());
}

#[tokio::test]
async fn search_by_date_range_is_inclusive_and_ordered() {
    let (_dir, metadata, service) = fixture(1024);

    // Three committed records on known days, inserted out of order.
    let mut ids = Vec::new();
    for (name, day) in [
        ("second.txt", "2024-01-15"),
        ("first.txt", "2024-01-01"),
        ("third.txt", "2024-01-31"),
    ] {
        let record = FileRecord::reserve(ObjectId::allocate(), name, Utc::now());
        metadata.reserve(&record).await.unwrap();
        let committed_at: DateTime<Utc> =
            format!("{day}T12:00:00Z").parse().expect("timestamp");
        metadata.commit(&record.id, 1, committed_at).await.unwrap();
        ids.push(record.id);
    }

    let results = service
        .search_by_date_range(date("2024-01-01"), date("2024-01-31"))
        .await
        .expect("search");
    assert_eq!(results.len(), 3);
    let names: Vec<_> = results.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, ["first.txt", "second.txt", "third.txt"]);

    // Day boundaries are inclusive on both ends.
    let results = service
        .search_by_date_range(date("2024-01-15"), date("2024-01-15"))
        .await
        .expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].display_name, "second.txt");

    // Outside the window.
    let results = service
        .search_by_date_range(date("2024-02-01"), date("2024-02-28"))
        .await
        .expect("search");
    assert!(results.is_empty());
}

#[tokio::test]
async fn delete_range_reports_per_item_outcomes() {
    let (dir, _metadata, service) = fixture(1024);

    let mut uploaded = Vec::new();
    for name in ["one.txt", "two.txt", "three.txt"] {
        let upload = service
            .upload(name, 4, &b"data"[..])
            .await
            .expect("upload");
        uploaded.push(upload.record);
    }

    // Remove the second record's blob out of band to force a per-item
    // failure mid-batch.
    blobs_of(&dir)
        .remove(&uploaded[1].stored_name)
        .await
        .expect("remove out of band");

    let today = Utc::now().date_naive();
    let outcomes = service
        .delete_range(today, today)
        .await
        .expect("delete_range");
    assert_eq!(outcomes.len(), 3);

    for outcome in &outcomes {
        if outcome.id == uploaded[1].id {
            let err = outcome.error.as_ref().expect("second item should fail");
            assert_eq!(err.kind(), "internal");
        } else {
            assert!(outcome.error.is_none(), "other items should succeed");
        }
    }

    // Successfully deleted records are gone from a fresh search; the failed
    // one is still discoverable via get.
    let remaining = service
        .search_by_date_range(today, today)
        .await
        .expect("search");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, uploaded[1].id);
    assert!(service.get(&uploaded[1].id).await.is_ok());
    assert!(matches!(
        service.get(&uploaded[0].id).await,
        Err(FileServiceError::NotFound)
    ));
    assert!(matches!(
        service.get(&uploaded[2].id).await,
        Err(FileServiceError::NotFound)
    ));
}

#[tokio::test]
async fn delete_range_with_no_matches_is_empty() {
    let (_dir, _metadata, service) = fixture(1024);
    let outcomes = service
        .delete_range(date("1999-01-01"), date("1999-01-02"))
        .await
        .expect("delete_range");
    assert!(outcomes.is_empty());
}

/// Metadata store wrapper that fails every commit, for exercising the
/// partial-upload path.
struct CommitFailingStore {
    inner: MemoryMetadataStore,
}

#[async_trait]
impl MetadataStore for CommitFailingStore {
    async fn reserve(&self, record: &FileRecord) -> Result<(), MetadataError> {
        self.inner.reserve(record).await
    }

    async fn commit(
        &self,
        _id: &ObjectId,
        _size: u64,
        _created_at: DateTime<Utc>,
    ) -> Result<Option<FileRecord>, MetadataError> {
        Err(MetadataError::Backend("injected commit failure".into()))
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<FileRecord>, MetadataError> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        self.inner.delete(id).await
    }

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        self.inner.range(from, to).await
    }

    async fn stale_reservations(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        self.inner.stale_reservations(older_than).await
    }

    async fn remove_reservation(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        self.inner.remove_reservation(id).await
    }
}

#[tokio::test]
async fn failed_commit_leaves_sweepable_reservation_and_blob() {
    let dir = tempfile::tempdir().expect("tempdir");
    let metadata = Arc::new(CommitFailingStore {
        inner: MemoryMetadataStore::new(),
    });
    let blobs = BlobStore::new(dir.path().join("blobs"));
    let service = FileService::new(
        Arc::clone(&metadata) as Arc<dyn MetadataStore>,
        blobs.clone(),
        FileServiceConfig { max_file_size: 1024 },
    );

    let result = service.upload("stuck.txt", 4, &b"data"[..]).await;
    assert!(matches!(result, Err(FileServiceError::Internal(_))));

    // The reservation and its blob both survive for the sweep to reclaim.
    let stale = metadata
        .stale_reservations(Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert!(blobs.open(&stale[0].stored_name).await.is_ok());
}
