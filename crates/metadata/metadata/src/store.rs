use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stowage_core::{FileRecord, ObjectId};

use crate::error::MetadataError;

/// Trait for persisting file metadata.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// Records move through exactly two stored states: a reservation created
/// before the blob is written, and a committed record created by flipping
/// the reservation once the blob write succeeded. Read paths (`get`,
/// `range`) only ever expose committed records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a reservation for a new id.
    ///
    /// Returns [`MetadataError::Conflict`] if the id already exists in any
    /// state; ids are never reused.
    async fn reserve(&self, record: &FileRecord) -> Result<(), MetadataError>;

    /// Flip a reservation to committed, recording the actual byte count and
    /// the commit timestamp.
    ///
    /// Returns the committed record, or `None` if no live reservation exists
    /// for the id (for example because the TTL sweep already reclaimed it).
    async fn commit(
        &self,
        id: &ObjectId,
        size: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Option<FileRecord>, MetadataError>;

    /// Look up a committed record. Returns `None` for unknown ids and for
    /// ids that only have a pending reservation.
    async fn get(&self, id: &ObjectId) -> Result<Option<FileRecord>, MetadataError>;

    /// Hard-remove a committed record. Returns `true` if a record was
    /// removed; repeating the call yields `false`, not an error.
    async fn delete(&self, id: &ObjectId) -> Result<bool, MetadataError>;

    /// All committed records with `created_at` in the inclusive bounds,
    /// ordered by `created_at` ascending. The result is a finite snapshot;
    /// re-issuing the query is always valid.
    async fn range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError>;

    /// Reservations created before the cutoff that never reached commit.
    /// Feed for the reconciliation sweep.
    async fn stale_reservations(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError>;

    /// Drop a reservation row. Returns `true` if one existed. Committed
    /// records are not touched.
    async fn remove_reservation(&self, id: &ObjectId) -> Result<bool, MetadataError>;
}
