use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// Longest extension (without the dot) carried into a stored name.
const MAX_EXTENSION_LEN: usize = 16;

/// Lifecycle state of a [`FileRecord`].
///
/// `Reserved` exists only during the upload window between the metadata
/// reservation and the post-blob-write commit. Reservations that outlive
/// their TTL are garbage-collected together with their orphaned blob.
/// There is no transition out of deletion: deleted records are removed and
/// their ids are never recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Reserved,
    Committed,
}

impl RecordState {
    /// Stable textual form used by relational backends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Committed => "committed",
        }
    }

    /// Parse the textual form produced by [`Self::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(Self::Reserved),
            "committed" => Some(Self::Committed),
            _ => None,
        }
    }
}

/// Metadata row describing one stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Externally visible identifier, assigned once.
    pub id: ObjectId,
    /// Client-supplied filename. Descriptive only; never used as a path.
    pub display_name: String,
    /// Identifier plus sanitized extension; the only string that addresses
    /// the blob store.
    pub stored_name: String,
    /// Byte length recorded at commit time. Zero while reserved.
    pub size: u64,
    /// Current lifecycle state.
    pub state: RecordState,
    /// When the reservation was created; basis for the TTL sweep.
    pub reserved_at: DateTime<Utc>,
    /// Commit timestamp; `Some` iff the record is committed. Basis for
    /// date-range queries.
    pub created_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Build a fresh reservation for the given display name.
    pub fn reserve(id: ObjectId, display_name: &str, now: DateTime<Utc>) -> Self {
        let stored = stored_name(&id, display_name);
        Self {
            id,
            display_name: display_name.to_owned(),
            stored_name: stored,
            size: 0,
            state: RecordState::Reserved,
            reserved_at: now,
            created_at: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == RecordState::Committed
    }
}

/// Derive the on-disk name for an object: the identifier plus the display
/// name's extension, if it has a safe one.
///
/// The display name is untrusted, so only a single trailing extension made
/// of ASCII alphanumerics (at most 16 bytes) survives; anything else,
/// including path separators and parent-directory sequences, is dropped.
/// This is the one place stored names are computed.
pub fn stored_name(id: &ObjectId, display_name: &str) -> String {
    match safe_extension(display_name) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

fn safe_extension(display_name: &str) -> Option<String> {
    let (stem, ext) = display_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
