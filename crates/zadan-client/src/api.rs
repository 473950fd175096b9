//! The REST collaborator seam.
//!
//! zadan consumes these endpoints, it does not re-specify them: the
//! embedding application supplies an implementation backed by its HTTP
//! client. Post and reaction IDs are client-generated, so create calls send
//! the full record and the server echoes the authoritative copy back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use zadan_types::{
    Post, PostId, PostPatch, Reaction, ReactionId, ReactionKind, ResourceId, Thread, ThreadId,
    UserId,
};

/// Failures from the REST collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Entity deleted or never existed server-side.
    #[error("not found")]
    NotFound,
    /// 409-style conflict (e.g. duplicate review submission).
    #[error("conflict")]
    Conflict,
    /// The server rejected the caller's identity.
    #[error("unauthorized")]
    Unauthorized,
    /// Transport-level failure reaching the server.
    #[error("network error: {0}")]
    Network(String),
    /// The server failed.
    #[error("server error: {0}")]
    Server(String),
}

/// Answer to "has this user reviewed this resource".
///
/// Best-effort: eventual-consistency windows mean a `false` here can be
/// stale, which is why the review gate trusts a local scan over it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub has_reviewed: bool,
    pub review_id: Option<PostId>,
}

/// The discussion REST endpoints, as consumed by the store.
#[async_trait]
pub trait DiscussionApi: Send + Sync {
    async fn fetch_thread(&self, thread_id: ThreadId) -> Result<Thread, ApiError>;

    /// Top-level posts, newest first, 1-based pages.
    async fn fetch_posts(
        &self,
        thread_id: ThreadId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ApiError>;

    /// Replies of one post, oldest first, 1-based pages.
    async fn fetch_replies(
        &self,
        post_id: PostId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ApiError>;

    async fn create_post(&self, post: &Post) -> Result<Post, ApiError>;

    async fn update_post(
        &self,
        post_id: PostId,
        author_id: UserId,
        patch: &PostPatch,
    ) -> Result<Post, ApiError>;

    async fn delete_post(&self, post_id: PostId, author_id: UserId) -> Result<(), ApiError>;

    async fn create_reaction(&self, reaction: &Reaction) -> Result<Reaction, ApiError>;

    async fn update_reaction(
        &self,
        reaction_id: ReactionId,
        kind: ReactionKind,
    ) -> Result<Reaction, ApiError>;

    async fn delete_reaction(&self, reaction_id: ReactionId) -> Result<(), ApiError>;

    async fn check_user_review(
        &self,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> Result<ReviewStatus, ApiError>;
}
