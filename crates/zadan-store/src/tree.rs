//! The post tree arena.
//!
//! Posts live in a flat `PostId → PostNode` map; the tree shape is parent
//! links plus per-node `child_ids`. Top-level posts are kept newest-first
//! (new posts prepend), replies oldest-first within whatever pages are
//! loaded. Both local actions and inbound events mutate through the same
//! operations, so the two paths can't disagree about structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use zadan_types::{Post, PostId};

use crate::error::StoreError;
use crate::node::PostNode;
use crate::Result;

/// Maximum reply nesting, counted in levels (a top-level post is level 1).
///
/// A reply that would land deeper is reparented to the nearest ancestor
/// that keeps it within the limit — the "reply to X" intent is preserved
/// loosely while the tree stays shallow.
pub const MAX_REPLY_DEPTH: usize = 3;

const EMPTY_CHILDREN: &[PostId] = &[];

/// Flat arena of posts for the active thread.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostTree {
    nodes: BTreeMap<PostId, PostNode>,
    /// Top-level post ids, newest first.
    roots: Vec<PostId>,
}

impl PostTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of posts loaded (top-level and replies).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: PostId) -> Option<&PostNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: PostId) -> Option<&mut PostNode> {
        self.nodes.get_mut(&id)
    }

    /// Shortcut to the wire record.
    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.nodes.get(&id).map(|n| &n.post)
    }

    /// Top-level post ids, newest first.
    pub fn roots(&self) -> &[PostId] {
        &self.roots
    }

    /// Loaded replies of a post, oldest first. Empty for unknown ids.
    pub fn children(&self, id: PostId) -> &[PostId] {
        self.nodes
            .get(&id)
            .map_or(EMPTY_CHILDREN, |n| n.child_ids.as_slice())
    }

    /// All loaded nodes, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &PostNode> {
        self.nodes.values()
    }

    /// Depth of a post: 0 for top-level. `None` when the id isn't loaded.
    pub fn depth(&self, id: PostId) -> Option<usize> {
        let mut depth = 0usize;
        let mut current = self.nodes.get(&id)?;
        // Parent links can't cycle under normal operation; the cap turns a
        // corrupted tree into a warn instead of a hang.
        while let Some(parent_id) = current.post.parent_id {
            if depth >= self.nodes.len() {
                tracing::warn!("parent chain for {id:?} exceeds tree size, treating as root");
                break;
            }
            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    depth += 1;
                    current = parent;
                }
                None => break,
            }
        }
        Some(depth)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert a new post — the path for optimistic local creation and for
    /// inbound `new-post` events.
    ///
    /// Replies are clamped to [`MAX_REPLY_DEPTH`]: a reply aimed at a post
    /// already at the deepest level is stored under that post's own parent,
    /// with `parent_id` rewritten accordingly. The parent's authoritative
    /// reply count is bumped here; top-level counting is the thread's
    /// concern and stays with the caller.
    pub fn insert(&mut self, mut post: Post) -> Result<PostId> {
        let id = post.id;
        if self.nodes.contains_key(&id) {
            return Err(StoreError::DuplicatePost(id));
        }

        match post.parent_id {
            Some(requested) => {
                let parent_id = self.resolve_reply_parent(requested)?;
                post.parent_id = Some(parent_id);
                self.nodes.insert(id, PostNode::new(post));
                let parent = self
                    .nodes
                    .get_mut(&parent_id)
                    .expect("resolved parent is loaded");
                parent.child_ids.push(id);
                parent.post.reply_count += 1;
            }
            None => {
                self.nodes.insert(id, PostNode::new(post));
                self.roots.insert(0, id);
            }
        }
        Ok(id)
    }

    /// Walk up from the requested parent until a reply there would stay
    /// within [`MAX_REPLY_DEPTH`].
    fn resolve_reply_parent(&self, requested: PostId) -> Result<PostId> {
        let mut current = requested;
        loop {
            let depth = self
                .depth(current)
                .ok_or(StoreError::ParentNotLoaded(requested))?;
            if depth + 1 < MAX_REPLY_DEPTH {
                if current != requested {
                    tracing::debug!(
                        "reply to {requested:?} reparented to {current:?} (depth limit {MAX_REPLY_DEPTH})"
                    );
                }
                return Ok(current);
            }
            // depth >= 1 here, so the parent link exists and is loaded
            current = self
                .nodes
                .get(&current)
                .and_then(|n| n.post.parent_id)
                .ok_or(StoreError::ParentNotLoaded(requested))?;
        }
    }

    /// Absorb a fetched page of posts (top-level or replies of one parent).
    ///
    /// Page contents may race with push events, so posts already present are
    /// skipped rather than treated as errors; reply counts are *not* bumped
    /// (paged replies are already in the server's summary). Top-level posts
    /// append — pages walk backward in time while fresh posts prepend.
    /// Returns how many posts were actually added.
    pub fn absorb_page(&mut self, posts: Vec<Post>) -> usize {
        let mut added = 0;
        for mut post in posts {
            let id = post.id;
            if self.nodes.contains_key(&id) {
                tracing::trace!("page post {id:?} already loaded, skipping");
                continue;
            }
            match post.parent_id {
                Some(requested) => {
                    let Ok(parent_id) = self.resolve_reply_parent(requested) else {
                        tracing::warn!(
                            "page reply {id:?} references unloaded parent {requested:?}, skipping"
                        );
                        continue;
                    };
                    post.parent_id = Some(parent_id);
                    self.nodes.insert(id, PostNode::new(post));
                    self.nodes
                        .get_mut(&parent_id)
                        .expect("resolved parent is loaded")
                        .child_ids
                        .push(id);
                }
                None => {
                    self.nodes.insert(id, PostNode::new(post));
                    self.roots.push(id);
                }
            }
            added += 1;
        }
        added
    }

    /// Remove a post and its whole subtree. Returns every removed id
    /// (the target first) so callers can purge per-post state keyed by any
    /// of them. Unknown ids return an empty vec — deleting what's already
    /// gone is a no-op, not an error.
    pub fn remove(&mut self, id: PostId) -> Vec<PostId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };

        // Detach from the parent (and its summary) or the root list first.
        match node.post.parent_id {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.child_ids.retain(|c| *c != id);
                    parent.post.reply_count = parent.post.reply_count.saturating_sub(1);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        // Iterative subtree collection — no recursion on deep chains.
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.child_ids.iter().copied());
                removed.push(current);
            }
        }
        removed
    }

    // =========================================================================
    // Snapshot / restore
    // =========================================================================

    /// Flatten to wire records in pre-order (each root followed by its
    /// loaded subtree), suitable for [`PostTree::from_posts`].
    pub fn flatten(&self) -> Vec<Post> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<PostId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(node.post.clone());
                stack.extend(node.child_ids.iter().rev().copied());
            }
        }
        out
    }

    /// Rebuild a tree from flattened records (restore path). Parents don't
    /// have to precede their replies; unresolvable orphans are dropped with
    /// a warning.
    pub fn from_posts(posts: Vec<Post>) -> Self {
        let mut tree = Self::new();
        let mut pending = posts;
        loop {
            let before = pending.len();
            let mut still_pending = Vec::new();
            for post in pending {
                let is_reply_to_unloaded = post
                    .parent_id
                    .is_some_and(|p| !tree.contains(p));
                if is_reply_to_unloaded {
                    still_pending.push(post);
                } else {
                    tree.absorb_page(vec![post]);
                }
            }
            if still_pending.is_empty() {
                break;
            }
            if still_pending.len() == before {
                tracing::warn!(
                    "dropping {} orphaned posts during tree restore",
                    still_pending.len()
                );
                break;
            }
            pending = still_pending;
        }
        tree
    }
}

// ============================================================================
// Tests
// ============================================================================
