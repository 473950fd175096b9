//! Shared identity and discussion wire types for zadan.
//!
//! This crate is the relational foundation: typed IDs and the records that
//! cross the REST and push-event boundaries. It has **no internal zadan
//! dependencies** — a pure leaf crate the store and client build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Thread (ThreadId) ← discussion container scoped to one resource
//!     └── kind: Discussion | CourseReview
//!     └── contains Post (top-level when parent_id is None)
//!
//! Post (PostId)
//!     └── parent_id forms the reply tree (max three levels)
//!     └── authored by a user (UserId)
//!     └── carries Reaction records + a ReactionCounts projection
//!
//! Reaction (ReactionId) ← typed endorsement, at most one per (post, user)
//!
//! ThreadUser ← ephemeral presence row, rebuilt from each broadcast
//! ```

pub mod ids;
pub mod post;
pub mod reaction;
pub mod thread;

// Re-export primary types at crate root for convenience.
pub use ids::{PostId, ReactionId, ResourceId, ThreadId, UserId};
pub use post::{Post, PostPatch};
pub use reaction::{Reaction, ReactionCounts, ReactionKind};
pub use thread::{Identity, Thread, ThreadKind, ThreadUser};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
