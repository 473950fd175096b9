//! Typed identifiers for threads, posts, users, reactions, and resources.
//!
//! All ID types wrap UUIDv7 (time-ordered, globally unique). They're opaque
//! on the wire and display as standard UUID text for logging. The `short()`
//! form (first 8 hex chars) is for human-facing output — never a lookup key.
//!
//! Client-generated IDs are what make optimistic creation work: a post gets
//! its `PostId` at the moment the user submits, before the server confirms,
//! so a racing push event for the same post is recognizable by id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A discussion-thread identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(uuid::Uuid);

/// A post identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(uuid::Uuid);

/// A user identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(uuid::Uuid);

/// A reaction-record identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionId(uuid::Uuid);

/// Identifier of the resource a thread is scoped to (a lesson or a course).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters — for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// A nil / zero ID — for sentinel values only.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(ThreadId, "ThreadId");
impl_typed_id!(PostId, "PostId");
impl_typed_id!(UserId, "UserId");
impl_typed_id!(ReactionId, "ReactionId");
impl_typed_id!(ResourceId, "ResourceId");

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ── Basic ID operations ─────────────────────────────────────────────

    #[test]
    fn test_new_is_unique() {
        let a = PostId::new();
        let b = PostId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_is_8_chars() {
        let id = ThreadId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_hex_is_32_chars() {
        let id = UserId::new();
        assert_eq!(id.to_hex().len(), 32);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let id = PostId::new();
        let bytes = *id.as_bytes();
        assert_eq!(id, PostId::from_bytes(bytes));
    }

    #[test]
    fn test_parse_hex() {
        let id = ReactionId::new();
        let parsed = ReactionId::parse(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_uuid_format() {
        let id = ThreadId::new();
        let parsed = ThreadId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_nil() {
        assert!(ResourceId::nil().is_nil());
        assert!(!ResourceId::new().is_nil());
    }

    #[test]
    fn test_ordering_is_time_ordered() {
        let ids: Vec<PostId> = (0..10).map(|_| PostId::new()).collect();
        for i in 1..ids.len() {
            assert!(ids[i] >= ids[i - 1]);
        }
    }

    // ── Serde roundtrips ────────────────────────────────────────────────

    #[test]
    fn test_serde_roundtrip() {
        let id = PostId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: PostId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_postcard_roundtrip() {
        let id = UserId::new();
        let bytes = postcard::to_stdvec(&id).unwrap();
        let parsed: UserId = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id, parsed);
    }

    // ── Type safety (distinct newtypes) ─────────────────────────────────

    #[test]
    fn test_debug_shows_type_and_short() {
        let bytes = *ThreadId::new().as_bytes();
        let thread = ThreadId::from_bytes(bytes);
        let post = PostId::from_bytes(bytes);
        let user = UserId::from_bytes(bytes);

        assert!(format!("{:?}", thread).starts_with("ThreadId("));
        assert!(format!("{:?}", post).starts_with("PostId("));
        assert!(format!("{:?}", user).starts_with("UserId("));
    }

    #[test]
    fn test_display_is_full_uuid_with_hyphens() {
        let id = ThreadId::new();
        let displayed = id.to_string();
        assert_eq!(displayed.len(), 36);
        assert_eq!(displayed.chars().filter(|c| *c == '-').count(), 4);
    }
}
