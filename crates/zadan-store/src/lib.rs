//! In-memory post tree for zadan clients.
//!
//! The tree is a flat arena — `PostId → PostNode` with parent/child links by
//! id — rather than a recursive object graph. Lookup and update are O(log n)
//! map operations, and subtree deletion is an iterative index rewrite with no
//! recursion depth to worry about.
//!
//! # Ownership
//!
//! The tree (and the presence list built on top of it in the client crate)
//! is exclusively owned by the discussion store. All mutation goes through
//! [`PostTree`] and the per-node reaction operations on [`PostNode`], which
//! is what keeps the `reaction_counts.total == Σ kind counts` invariant
//! enforceable at a small number of call sites.

mod error;
mod node;
mod pagination;
mod tree;

pub use error::StoreError;
pub use node::PostNode;
pub use pagination::{
    DEFAULT_REPLY_PAGE_SIZE, ReplyPageState, ReplyPagination, ToggleOutcome,
};
pub use tree::{MAX_REPLY_DEPTH, PostTree};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
