//! Error taxonomy for store actions.
//!
//! Recoverable failures are also captured into the store-level error slot
//! ([`DiscussionStore::take_error`](crate::DiscussionStore::take_error)) so
//! the UI layer can render a toast without handling `Result`s itself — no
//! error crosses from the core into rendering code as a panic or an
//! unhandled rejection.

use thiserror::Error;

use zadan_store::StoreError;
use zadan_types::PostId;

use crate::api::ApiError;
use crate::transport::TransportError;

/// Errors surfaced by [`DiscussionStore`](crate::DiscussionStore) actions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The thread was deleted server-side. Tree cleared, no retry.
    #[error("discussion thread no longer exists")]
    ThreadNotFound,

    /// The post was deleted server-side.
    #[error("post no longer exists: {0:?}")]
    PostNotFound(PostId),

    /// Action attempted without a signed-in user — short-circuited locally,
    /// the network is never touched.
    #[error("sign in to participate in the discussion")]
    NotSignedIn,

    /// Action needs an active thread.
    #[error("no active discussion thread")]
    NoActiveThread,

    /// One rating-bearing top-level post per user per review thread.
    #[error("you have already reviewed this course")]
    AlreadyReviewed,

    /// Connection-layer failure; the manager's reconnect policy owns retry.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// REST collaborator failure that doesn't map to a more specific case.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Tree mutation rejected.
    #[error(transparent)]
    Store(#[from] StoreError),
}
