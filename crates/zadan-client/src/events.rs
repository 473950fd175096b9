//! Push-event types for the `/threads` realtime namespace.
//!
//! [`ServerEvent`] is the typed form of everything the server pushes to a
//! joined client; [`ClientEvent`] covers the two bare coordination events a
//! client emits. Both are closed unions dispatched by exhaustive `match`, so
//! adding an event kind is a compile-time-checked change.

use serde::{Deserialize, Serialize};

use zadan_types::{Post, PostId, PostPatch, Reaction, ReactionId, ThreadId, ThreadUser, UserId};

/// Events pushed from the server to every client joined to a thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Someone created a post (top-level or reply).
    NewPost { post: Post },
    /// A post was edited. The payload is a patch — it is not guaranteed to
    /// carry the subtree or reaction data, so merging must preserve what it
    /// omits.
    UpdatePost {
        post_id: PostId,
        author_id: UserId,
        patch: PostPatch,
    },
    /// A post (and implicitly its subtree) was deleted.
    DeletePost { post_id: PostId },
    /// A reaction was added to a post.
    NewReaction { reaction: Reaction },
    /// A user switched their reaction kind.
    UpdateReaction { reaction: Reaction },
    /// A reaction was retracted.
    DeleteReaction {
        reaction_id: ReactionId,
        post_id: PostId,
    },
    /// Authoritative presence snapshot — fully replaces the local list.
    ThreadUsers {
        thread_id: ThreadId,
        users: Vec<ThreadUser>,
    },
    /// A single participant joined (upsert by user id).
    UserJoined { user: ThreadUser },
}

/// Coordination events a client emits. Join/leave never carry or trigger
/// post data — data refresh after a rejoin is the store's own concern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinThread {
        thread_id: ThreadId,
        user_id: UserId,
        user_name: String,
    },
    LeaveThread {
        thread_id: ThreadId,
        user_id: UserId,
    },
}

// ============================================================================
// Tests
// ============================================================================
