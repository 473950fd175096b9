//! Post wire records.
//!
//! `Post` is the full record as the REST API and push events carry it.
//! `PostPatch` is the partial form used by update events and PATCH
//! responses: every field optional, so a merge can adopt exactly what the
//! payload carries — in particular, reaction data is only taken when
//! present, and loaded replies are never part of the payload at all.

use serde::{Deserialize, Serialize};

use crate::ids::{PostId, ThreadId, UserId};
use crate::reaction::{Reaction, ReactionCounts};
use crate::thread::Identity;

/// A single message node, possibly nested under a parent post.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub thread_id: ThreadId,
    /// `None` ⇒ top-level post.
    pub parent_id: Option<PostId>,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    /// Only meaningful on top-level posts of a review thread (1–5).
    pub rating: Option<u8>,
    pub edited: bool,
    pub created_at: u64,
    pub updated_at: u64,
    /// Server-authoritative reply count — distinct from however many
    /// replies the client has actually loaded.
    pub reply_count: u32,
    pub reactions: Vec<Reaction>,
    pub reaction_counts: ReactionCounts,
}

impl Post {
    /// Create a locally authored post, ID assigned client-side so the
    /// optimistic insert and the server's confirmation refer to the same
    /// record.
    pub fn new(
        thread_id: ThreadId,
        author: &Identity,
        content: impl Into<String>,
        parent_id: Option<PostId>,
        rating: Option<u8>,
    ) -> Self {
        let now = crate::now_millis();
        Self {
            id: PostId::new(),
            thread_id,
            parent_id,
            author_id: author.user_id,
            author_name: author.user_name.clone(),
            content: content.into(),
            rating,
            edited: false,
            created_at: now,
            updated_at: now,
            reply_count: 0,
            reactions: Vec::new(),
            reaction_counts: ReactionCounts::new(),
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// A rating-bearing top-level post — the kind the review gate limits to
    /// one per user per review thread.
    pub fn is_review(&self) -> bool {
        self.is_top_level() && self.rating.is_some()
    }
}

/// Partial update payload. `None` fields are left untouched on merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPatch {
    pub content: Option<String>,
    pub rating: Option<u8>,
    pub edited: Option<bool>,
    pub updated_at: Option<u64>,
    pub reactions: Option<Vec<Reaction>>,
    pub reaction_counts: Option<ReactionCounts>,
}

impl PostPatch {
    /// A content-edit patch, the common case.
    pub fn edit(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            edited: Some(true),
            updated_at: Some(crate::now_millis()),
            ..Self::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ThreadId;

    fn author() -> Identity {
        Identity::new(UserId::new(), "Alice")
    }

    #[test]
    fn test_top_level_post() {
        let p = Post::new(ThreadId::new(), &author(), "hello", None, None);
        assert!(p.is_top_level());
        assert!(!p.is_review());
        assert!(!p.edited);
        assert_eq!(p.reply_count, 0);
    }

    #[test]
    fn test_reply_is_not_top_level() {
        let parent = PostId::new();
        let p = Post::new(ThreadId::new(), &author(), "re", Some(parent), None);
        assert!(!p.is_top_level());
        assert_eq!(p.parent_id, Some(parent));
    }

    #[test]
    fn test_rated_top_level_is_review() {
        let p = Post::new(ThreadId::new(), &author(), "great course", None, Some(5));
        assert!(p.is_review());
    }

    #[test]
    fn test_rated_reply_is_not_review() {
        // A rating on a reply is ignored by the gate — only top-level counts.
        let p = Post::new(
            ThreadId::new(),
            &author(),
            "re",
            Some(PostId::new()),
            Some(4),
        );
        assert!(!p.is_review());
    }

    #[test]
    fn test_edit_patch_shape() {
        let patch = PostPatch::edit("updated");
        assert_eq!(patch.content.as_deref(), Some("updated"));
        assert_eq!(patch.edited, Some(true));
        assert!(patch.reactions.is_none());
        assert!(patch.reaction_counts.is_none());
    }

    #[test]
    fn test_post_json_roundtrip() {
        let p = Post::new(ThreadId::new(), &author(), "hello", None, Some(3));
        let json = serde_json::to_string(&p).unwrap();
        let parsed: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(p, parsed);
    }

    #[test]
    fn test_post_postcard_roundtrip() {
        let p = Post::new(ThreadId::new(), &author(), "hello", None, None);
        let bytes = postcard::to_stdvec(&p).unwrap();
        let parsed: Post = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(p, parsed);
    }
}
