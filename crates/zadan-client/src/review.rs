//! The review gate: one rating-bearing top-level post per user per
//! course-review thread.
//!
//! Local state is consulted first — the sticky `has_reviewed` flag, then a
//! scan of the loaded top-level posts. Only when both are inconclusive is
//! the server asked, and its answer is best-effort: a stale "not reviewed"
//! must never override a local hit, and a check failure must not block the
//! submission (the server still enforces the rule with a conflict, which
//! the store treats as a state correction rather than an error).

use serde::{Deserialize, Serialize};

use zadan_store::PostTree;
use zadan_types::{PostId, ResourceId, UserId};

use crate::api::DiscussionApi;
use crate::error::ClientError;

/// Per-thread review state. Reset whenever the active thread changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewGate {
    pub has_reviewed: bool,
    pub review_id: Option<PostId>,
}

impl ReviewGate {
    /// Find the user's rated top-level post among the loaded roots.
    pub fn local_scan(tree: &PostTree, user_id: UserId) -> Option<PostId> {
        tree.roots()
            .iter()
            .copied()
            .find(|id| {
                tree.post(*id)
                    .is_some_and(|p| p.author_id == user_id && p.is_review())
            })
    }

    /// Latch the reviewed state (a conflict response lands here with no id).
    pub fn mark_reviewed(&mut self, review_id: Option<PostId>) {
        self.has_reviewed = true;
        if review_id.is_some() {
            self.review_id = review_id;
        }
    }

    /// Gate a new rated top-level post. Local evidence short-circuits before
    /// any network call; the server check only runs when local state is
    /// inconclusive.
    pub async fn ensure_can_review(
        &mut self,
        api: &dyn DiscussionApi,
        tree: &PostTree,
        resource_id: ResourceId,
        user_id: UserId,
    ) -> Result<(), ClientError> {
        if self.has_reviewed {
            return Err(ClientError::AlreadyReviewed);
        }
        if let Some(id) = Self::local_scan(tree, user_id) {
            self.mark_reviewed(Some(id));
            return Err(ClientError::AlreadyReviewed);
        }

        match api.check_user_review(resource_id, user_id).await {
            Ok(status) if status.has_reviewed => {
                self.mark_reviewed(status.review_id);
                Err(ClientError::AlreadyReviewed)
            }
            Ok(_) => Ok(()),
            Err(e) => {
                // Best-effort check; submission still goes to the server,
                // which answers with a conflict if the user already reviewed.
                tracing::warn!("review check failed, allowing submission: {e}");
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
