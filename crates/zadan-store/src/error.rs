//! Error types for tree operations.

use thiserror::Error;

use zadan_types::PostId;

/// Errors that can occur while mutating the post tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Post not found in the tree.
    #[error("post not found: {0:?}")]
    PostNotFound(PostId),

    /// A reply referenced a parent the client hasn't loaded.
    #[error("parent post not loaded: {0:?}")]
    ParentNotLoaded(PostId),

    /// A post with this id already exists.
    #[error("post already exists: {0:?}")]
    DuplicatePost(PostId),
}
