//! Per-post reply pagination state.
//!
//! Tracks, for each parent post, how many reply pages have been fetched and
//! whether the reply list is currently shown. The replies themselves live in
//! the tree (as loaded children); this controller only answers "which page
//! next" and "is there anything left to load".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use zadan_types::PostId;

/// Replies fetched per page unless the caller configures otherwise.
pub const DEFAULT_REPLY_PAGE_SIZE: u32 = 5;

/// Pagination state for one parent post.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPageState {
    /// Highest page number attempted (1-based; 0 = never fetched).
    pub pages_loaded: u32,
    /// Whether the reply list is currently shown.
    pub visible: bool,
    /// Set once a fetch came back short — stops "load more" from being
    /// offered again, independent of visibility.
    pub exhausted: bool,
}

/// What a visibility toggle asks of the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Now visible and never fetched — fetch page 1.
    ShownNeedsFetch,
    /// Now visible, replies already loaded.
    Shown,
    Hidden,
}

/// Reply pagination across all posts of the active thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyPagination {
    page_size: u32,
    states: HashMap<PostId, ReplyPageState>,
}

impl Default for ReplyPagination {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_PAGE_SIZE)
    }
}

impl ReplyPagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            states: HashMap::new(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Current state for a post (default when never touched).
    pub fn state(&self, id: PostId) -> ReplyPageState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    pub fn is_visible(&self, id: PostId) -> bool {
        self.state(id).visible
    }

    /// Flip visibility. First reveal of a never-fetched post asks the caller
    /// to load page 1.
    pub fn toggle(&mut self, id: PostId) -> ToggleOutcome {
        let st = self.states.entry(id).or_default();
        st.visible = !st.visible;
        if !st.visible {
            ToggleOutcome::Hidden
        } else if st.pages_loaded == 0 && !st.exhausted {
            ToggleOutcome::ShownNeedsFetch
        } else {
            ToggleOutcome::Shown
        }
    }

    /// Force visibility on — the author-auto-reveal path when a reply to
    /// their post arrives.
    pub fn reveal(&mut self, id: PostId) {
        self.states.entry(id).or_default().visible = true;
    }

    /// Page number to request next, from how many replies are loaded.
    pub fn next_page(&self, loaded: usize) -> u32 {
        (loaded as u32).div_ceil(self.page_size) + 1
    }

    /// Record a completed fetch. The attempted page is recorded even for an
    /// empty result (so "load more" stops being offered); visibility is
    /// never touched here. A short page marks the post exhausted.
    pub fn record_page(&mut self, id: PostId, page: u32, returned: usize) {
        let st = self.states.entry(id).or_default();
        st.pages_loaded = st.pages_loaded.max(page);
        if (returned as u32) < self.page_size {
            st.exhausted = true;
        }
    }

    /// Whether another page is worth requesting, judged against the
    /// server-authoritative reply total.
    pub fn has_more(&self, id: PostId, loaded: usize, authoritative_total: u32) -> bool {
        let st = self.state(id);
        !st.exhausted && (loaded as u32) < authoritative_total
    }

    /// Drop state for deleted posts.
    pub fn purge(&mut self, ids: &[PostId]) {
        for id in ids {
            self.states.remove(id);
        }
    }

    /// Reset everything — thread switch.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Export per-post states for a durable snapshot (sorted for stable
    /// output).
    pub fn snapshot_states(&self) -> Vec<(PostId, ReplyPageState)> {
        let mut states: Vec<_> = self.states.iter().map(|(id, st)| (*id, *st)).collect();
        states.sort_by_key(|(id, _)| *id);
        states
    }

    /// Restore per-post states from a durable snapshot.
    pub fn restore_states(&mut self, states: impl IntoIterator<Item = (PostId, ReplyPageState)>) {
        self.states = states.into_iter().collect();
    }
}

// ============================================================================
// Tests
// ============================================================================
