use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a stored object.
///
/// Allocated once at upload time and never reused. The textual form is a
/// hyphenated v4 UUID: 128 random bits, which makes collisions negligible
/// over any realistic object count. The metadata store's uniqueness
/// constraint is the authoritative tie-breaker if one ever occurs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Allocate a fresh random identifier.
    pub fn allocate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// View the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_unique() {
        let a = ObjectId::allocate();
        let b = ObjectId::allocate();
        assert_ne!(a, b);
    }

    #[test]
    fn allocate_is_hyphenated_uuid() {
        let id = ObjectId::allocate();
        assert_eq!(id.as_str().len(), 36);
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn display_round_trips() {
        let id = ObjectId::allocate();
        assert_eq!(ObjectId::from(id.to_string()), id);
    }
}
