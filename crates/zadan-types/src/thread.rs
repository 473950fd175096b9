//! Thread metadata, presence rows, and the current-user identity.
//!
//! A `Thread` is replaced wholesale when the active thread id changes —
//! runtime state (connection health, presence) lives in the client crate.

use serde::{Deserialize, Serialize};

use crate::ids::{ResourceId, ThreadId, UserId};

/// What kind of discussion a thread holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadKind {
    /// Generic lesson discussion.
    #[default]
    Discussion,
    /// Course review thread — top-level posts may carry a rating, and each
    /// user gets at most one rated top-level post.
    CourseReview,
}

/// A discussion container scoped to one resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub kind: ThreadKind,
    /// The lesson or course this thread belongs to.
    pub resource_id: ResourceId,
    /// Server-authoritative count of top-level posts.
    pub post_count: u32,
    /// Aggregate rating across reviews (review threads only).
    pub rating: Option<f32>,
}

impl Thread {
    pub fn new(kind: ThreadKind, resource_id: ResourceId) -> Self {
        Self {
            id: ThreadId::new(),
            kind,
            resource_id,
            post_count: 0,
            rating: None,
        }
    }

    /// Whether the review gate applies to this thread.
    pub fn is_review(&self) -> bool {
        self.kind == ThreadKind::CourseReview
    }
}

/// A participant currently viewing the thread. Ephemeral — the whole list is
/// rebuilt from the latest presence broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadUser {
    pub user_id: UserId,
    pub user_name: String,
}

/// The locally known current user. Supplied by the embedding application;
/// zadan treats it as a constant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub user_name: String,
}

impl Identity {
    pub fn new(user_id: UserId, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
