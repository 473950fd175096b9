//! Durable-session persistence.
//!
//! [`DurableSession`] is the explicit durable half of the store's state —
//! the part that survives a reload. Connection state, presence, and
//! in-flight loading flags are *not fields of this type at all*: the
//! partition is a type boundary, not a field-name allowlist, so ephemeral
//! state can't leak into the cache by accident and always reinitializes to
//! its defaults (disconnected, empty, not loading) on cold start.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use zadan_store::ReplyPageState;
use zadan_types::{Identity, Post, PostId, Thread, ThreadId, UserId};

/// Everything worth writing to local storage between visits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DurableSession {
    pub identity: Option<Identity>,
    /// Active thread snapshot.
    pub thread: Option<Thread>,
    /// Loaded post tree, flattened in pre-order.
    pub posts: Vec<Post>,
    /// Per-post reply pagination state (the loaded-replies cache).
    pub reply_pages: Vec<(PostId, ReplyPageState)>,
    pub post_pages_loaded: u32,
    pub posts_exhausted: bool,
    /// Review-gate latch.
    pub has_reviewed: bool,
    pub review_id: Option<PostId>,
    /// Last `(thread, user)` pair fully fetched — lets a restored session
    /// skip the redundant refetch.
    pub last_fetched: Option<(ThreadId, UserId)>,
}

/// Failures reading or writing the session cache.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("session cache I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("session cache is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed cache for one [`DurableSession`].
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the cached session. A missing file is a normal first run, not
    /// an error.
    pub fn load(&self) -> Result<Option<DurableSession>, PersistError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, session: &DurableSession) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(session)?)?;
        Ok(())
    }

    /// Drop the cache (sign-out path).
    pub fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
