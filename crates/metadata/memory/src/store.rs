use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use stowage_core::{FileRecord, ObjectId, RecordState};
use stowage_metadata::error::MetadataError;
use stowage_metadata::store::MetadataStore;

/// In-memory [`MetadataStore`] backed by a [`DashMap`].
///
/// Suitable for tests and single-process deployments. All trait methods are
/// synchronous internally and return immediately.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: DashMap<String, FileRecord>,
}

impl MemoryMetadataStore {
    /// Create a new, empty in-memory metadata store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn reserve(&self, record: &FileRecord) -> Result<(), MetadataError> {
        // Uniqueness is enforced across both states: an id is taken for
        // good the moment it is reserved.
        match self.records.entry(record.id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(MetadataError::Conflict(record.id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(FileRecord {
                    state: RecordState::Reserved,
                    created_at: None,
                    ..record.clone()
                });
                Ok(())
            }
        }
    }

    async fn commit(
        &self,
        id: &ObjectId,
        size: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Option<FileRecord>, MetadataError> {
        let Some(mut entry) = self.records.get_mut(id.as_str()) else {
            return Ok(None);
        };
        if entry.state != RecordState::Reserved {
            return Ok(None);
        }
        entry.state = RecordState::Committed;
        entry.size = size;
        entry.created_at = Some(created_at);
        Ok(Some(entry.clone()))
    }

    async fn get(&self, id: &ObjectId) -> Result<Option<FileRecord>, MetadataError> {
        let found = self
            .records
            .get(id.as_str())
            .filter(|r| r.is_committed())
            .map(|r| r.value().clone());
        Ok(found)
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        let removed = self
            .records
            .remove_if(id.as_str(), |_, record| record.is_committed());
        Ok(removed.is_some())
    }

    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        let mut matched: Vec<FileRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.created_at
                    .is_some_and(|created| created >= from && created <= to)
            })
            .map(|r| r.value().clone())
            .collect();
        matched.sort_by_key(|r| r.created_at);
        Ok(matched)
    }

    async fn stale_reservations(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        let stale = self
            .records
            .iter()
            .filter(|r| r.state == RecordState::Reserved && r.reserved_at < older_than)
            .map(|r| r.value().clone())
            .collect();
        Ok(stale)
    }

    async fn remove_reservation(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        let removed = self
            .records
            .remove_if(id.as_str(), |_, record| !record.is_committed());
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use stowage_metadata::testing::run_metadata_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryMetadataStore::new();
        run_metadata_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn delete_leaves_reservations_alone() {
        let store = MemoryMetadataStore::new();
        let record = FileRecord::reserve(ObjectId::allocate(), "pending.txt", Utc::now());
        store.reserve(&record).await.unwrap();

        // A reservation is not deletable through the committed-record path.
        assert!(!store.delete(&record.id).await.unwrap());
        assert!(store.remove_reservation(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn range_ignores_reservations() {
        let store = MemoryMetadataStore::new();
        let record = FileRecord::reserve(ObjectId::allocate(), "pending.txt", Utc::now());
        store.reserve(&record).await.unwrap();

        let window = store
            .range(Utc::now() - Duration::days(1), Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn commit_twice_returns_none() {
        let store = MemoryMetadataStore::new();
        let record = FileRecord::reserve(ObjectId::allocate(), "once.txt", Utc::now());
        store.reserve(&record).await.unwrap();

        let first = store.commit(&record.id, 5, Utc::now()).await.unwrap();
        assert!(first.is_some());
        let second = store.commit(&record.id, 5, Utc::now()).await.unwrap();
        assert!(second.is_none(), "a record commits exactly once");
    }
}
