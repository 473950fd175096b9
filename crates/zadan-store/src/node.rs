//! A single tree node: the wire post plus loaded-children links and the
//! reaction-list maintenance that keeps the count projection in lockstep.

use serde::{Deserialize, Serialize};

use zadan_types::{Post, PostId, PostPatch, Reaction, ReactionCounts, ReactionId, UserId};

/// One post in the tree. `child_ids` are the replies actually loaded
/// client-side, oldest first — `post.reply_count` stays the server's total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostNode {
    pub post: Post,
    pub child_ids: Vec<PostId>,
}

impl PostNode {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            child_ids: Vec::new(),
        }
    }

    /// Number of replies actually loaded (vs `post.reply_count`, the
    /// server-authoritative total).
    pub fn loaded_reply_count(&self) -> usize {
        self.child_ids.len()
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// The current user's reaction on this post, if any.
    pub fn reaction_by_user(&self, user_id: UserId) -> Option<&Reaction> {
        self.post.reactions.iter().find(|r| r.user_id == user_id)
    }

    /// Insert or replace the reaction for `reaction.user_id`, keeping at most
    /// one record per user and updating the count projection in the same
    /// step. Returns the kind that was replaced, if any.
    ///
    /// Re-applying an identical record is a no-op on the counts (the switch
    /// path decrements and increments the same kind), so duplicate event
    /// delivery is harmless.
    pub fn set_reaction(&mut self, reaction: Reaction) -> Option<zadan_types::ReactionKind> {
        let new_kind = reaction.kind;
        match self
            .post
            .reactions
            .iter_mut()
            .find(|r| r.user_id == reaction.user_id)
        {
            Some(existing) => {
                let old_kind = existing.kind;
                *existing = reaction;
                self.post.reaction_counts.apply_add(new_kind, Some(old_kind));
                Some(old_kind)
            }
            None => {
                self.post.reactions.push(reaction);
                self.post.reaction_counts.apply_add(new_kind, None);
                None
            }
        }
    }

    /// Remove a reaction by record id. Absent id is a no-op (the retraction
    /// was already applied locally or the record was never loaded).
    pub fn remove_reaction(&mut self, reaction_id: ReactionId) -> Option<Reaction> {
        let idx = self.post.reactions.iter().position(|r| r.id == reaction_id)?;
        let removed = self.post.reactions.remove(idx);
        self.post.reaction_counts.apply_remove(removed.kind);
        Some(removed)
    }

    /// Remove whatever reaction `user_id` holds on this post.
    pub fn remove_reaction_by_user(&mut self, user_id: UserId) -> Option<Reaction> {
        let idx = self
            .post
            .reactions
            .iter()
            .position(|r| r.user_id == user_id)?;
        let removed = self.post.reactions.remove(idx);
        self.post.reaction_counts.apply_remove(removed.kind);
        Some(removed)
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Merge an update payload onto this node. Loaded replies are never part
    /// of the payload and are always preserved; reaction data is adopted only
    /// when the patch carries it. A patch with reactions but no counts gets a
    /// recount so the projection can't drift.
    pub fn merge_patch(&mut self, patch: PostPatch) {
        if let Some(content) = patch.content {
            self.post.content = content;
        }
        if let Some(rating) = patch.rating {
            self.post.rating = Some(rating);
        }
        if let Some(edited) = patch.edited {
            self.post.edited = edited;
        }
        if let Some(updated_at) = patch.updated_at {
            self.post.updated_at = updated_at;
        }
        match (patch.reactions, patch.reaction_counts) {
            (Some(reactions), Some(counts)) => {
                self.post.reactions = reactions;
                self.post.reaction_counts = counts;
            }
            (Some(reactions), None) => {
                self.post.reaction_counts = ReactionCounts::from_reactions(&reactions);
                self.post.reactions = reactions;
            }
            (None, Some(counts)) => {
                self.post.reaction_counts = counts;
            }
            (None, None) => {}
        }
    }

    /// Adopt a server confirmation of this post. Scalar fields come from the
    /// server; loaded replies stay, and the reply count never goes below what
    /// is already loaded.
    pub fn merge_authoritative(&mut self, server: Post) {
        let loaded = self.child_ids.len() as u32;
        self.post = server;
        self.post.reply_count = self.post.reply_count.max(loaded);
    }
}

// ============================================================================
// Tests
// ============================================================================
