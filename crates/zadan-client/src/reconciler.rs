//! Inbound-event reconciliation.
//!
//! Every push event runs through the same two screens before touching
//! state: self-origination (the local optimistic path already applied the
//! change — re-applying would double-count or resurrect deleted state) and
//! existence/absence checks (so duplicate delivery and REST/push races
//! resolve into no-ops). Events are processed strictly in delivery order;
//! that ordering guarantee is what makes these checks sufficient for
//! idempotence.

use crate::events::ServerEvent;
use crate::store::DiscussionStore;

/// What happened to an applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event mutated local state.
    Applied,
    /// The event was discarded (see reason). Skips are normal operation,
    /// not errors.
    Skipped(SkipReason),
}

/// Why an event was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Authored by the current user — already applied optimistically.
    SelfOriginated,
    /// The post already exists (REST confirmation and push event raced).
    DuplicatePost,
    /// The payload references a post the client hasn't loaded. Normal race,
    /// never an error — an orphan must not be created.
    ParentNotLoaded,
    /// Target post isn't loaded (or was already removed).
    UnknownPost,
    /// Target reaction record isn't present.
    UnknownReaction,
    /// The event belongs to a thread that isn't active here.
    ForeignThread,
}

impl DiscussionStore {
    /// Apply one push event to local state. Called by the event pump for
    /// every inbound [`ServerEvent`], in delivery order.
    pub fn apply_event(&mut self, event: ServerEvent) -> ApplyOutcome {
        let current_user = self.identity.as_ref().map(|i| i.user_id);
        match event {
            ServerEvent::NewPost { post } => {
                if current_user == Some(post.author_id) {
                    tracing::trace!("new-post {:?} is self-originated, dropping", post.id);
                    return ApplyOutcome::Skipped(SkipReason::SelfOriginated);
                }
                if self.thread.as_ref().is_none_or(|t| t.id != post.thread_id) {
                    return ApplyOutcome::Skipped(SkipReason::ForeignThread);
                }
                if self.tree.contains(post.id) {
                    tracing::trace!("new-post {:?} already loaded, dropping", post.id);
                    return ApplyOutcome::Skipped(SkipReason::DuplicatePost);
                }

                match post.parent_id {
                    Some(parent_id) => {
                        if !self.tree.contains(parent_id) {
                            return ApplyOutcome::Skipped(SkipReason::ParentNotLoaded);
                        }
                        let parent_author = self.tree.post(parent_id).map(|p| p.author_id);
                        if self.tree.insert(post).is_err() {
                            return ApplyOutcome::Skipped(SkipReason::ParentNotLoaded);
                        }
                        // The author of the parent sees responses immediately.
                        if parent_author == current_user && current_user.is_some() {
                            self.pagination.reveal(parent_id);
                        }
                    }
                    None => {
                        if self.tree.insert(post).is_err() {
                            return ApplyOutcome::Skipped(SkipReason::DuplicatePost);
                        }
                        if let Some(t) = self.thread.as_mut() {
                            t.post_count += 1;
                        }
                    }
                }
                self.touch();
                ApplyOutcome::Applied
            }

            ServerEvent::UpdatePost {
                post_id,
                author_id,
                patch,
            } => {
                if current_user == Some(author_id) {
                    return ApplyOutcome::Skipped(SkipReason::SelfOriginated);
                }
                let Some(node) = self.tree.get_mut(post_id) else {
                    return ApplyOutcome::Skipped(SkipReason::UnknownPost);
                };
                node.merge_patch(patch);
                self.touch();
                ApplyOutcome::Applied
            }

            ServerEvent::DeletePost { post_id } => {
                // No author in the payload; the absence check below is the
                // self-origination filter for deletes.
                let Some(post) = self.tree.post(post_id) else {
                    return ApplyOutcome::Skipped(SkipReason::UnknownPost);
                };
                let was_top_level = post.parent_id.is_none();
                let removed = self.tree.remove(post_id);
                self.pagination.purge(&removed);
                if was_top_level
                    && let Some(t) = self.thread.as_mut()
                {
                    t.post_count = t.post_count.saturating_sub(1);
                }
                self.touch();
                ApplyOutcome::Applied
            }

            ServerEvent::NewReaction { reaction } | ServerEvent::UpdateReaction { reaction } => {
                if current_user == Some(reaction.user_id) {
                    return ApplyOutcome::Skipped(SkipReason::SelfOriginated);
                }
                let Some(node) = self.tree.get_mut(reaction.post_id) else {
                    // Post not loaded client-side — a normal race.
                    return ApplyOutcome::Skipped(SkipReason::UnknownPost);
                };
                node.set_reaction(reaction);
                self.touch();
                ApplyOutcome::Applied
            }

            ServerEvent::DeleteReaction {
                reaction_id,
                post_id,
            } => {
                let Some(node) = self.tree.get_mut(post_id) else {
                    return ApplyOutcome::Skipped(SkipReason::UnknownPost);
                };
                if node.remove_reaction(reaction_id).is_none() {
                    return ApplyOutcome::Skipped(SkipReason::UnknownReaction);
                }
                self.touch();
                ApplyOutcome::Applied
            }

            ServerEvent::ThreadUsers { thread_id, users } => {
                if self.thread.as_ref().is_none_or(|t| t.id != thread_id) {
                    return ApplyOutcome::Skipped(SkipReason::ForeignThread);
                }
                // Authoritative snapshot — replace, don't merge.
                self.presence = users;
                self.touch();
                ApplyOutcome::Applied
            }

            ServerEvent::UserJoined { user } => {
                match self
                    .presence
                    .iter_mut()
                    .find(|u| u.user_id == user.user_id)
                {
                    Some(existing) => *existing = user,
                    None => self.presence.push(user),
                }
                self.touch();
                ApplyOutcome::Applied
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::store::{DiscussionStore, StoreConfig};
    use crate::testing::MockApi;
    use crate::transport::{ChannelTransport, TransportHarness};
    use zadan_types::{
        Identity, Post, PostId, Reaction, ReactionKind, ResourceId, Thread, ThreadId, ThreadKind,
        ThreadUser, UserId,
    };

    struct Fixture {
        store: DiscussionStore,
        harness: TransportHarness,
        me: Identity,
        thread: Thread,
    }

    /// A store joined to a seeded discussion thread with one existing post
    /// by another user.
    async fn fixture() -> (Fixture, PostId) {
        let api = Arc::new(MockApi::new());
        let mut thread = Thread::new(ThreadKind::Discussion, ResourceId::new());
        thread.post_count = 1;
        let other = Identity::new(UserId::new(), "Bob");
        let existing = Post::new(thread.id, &other, "first!", None, None);
        let existing_id = existing.id;
        api.seed_thread(thread.clone());
        api.seed_posts(thread.id, vec![existing]);

        let (transport, harness) = ChannelTransport::pair();
        let mut store = DiscussionStore::new(api, Box::new(transport), StoreConfig::default());
        let me = Identity::new(UserId::new(), "Alice");
        store.set_identity(me.clone());
        store.connect().unwrap();
        store.set_active_thread(thread.id).await.unwrap();
        store.pump_events();

        (
            Fixture {
                store,
                harness,
                me,
                thread,
            },
            existing_id,
        )
    }

    fn other_post(thread: &Thread, parent: Option<PostId>) -> Post {
        let other = Identity::new(UserId::new(), "Carol");
        Post::new(thread.id, &other, "from the wire", parent, None)
    }

    // ── new-post ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_new_top_level_post_prepends_and_counts() {
        let (mut fx, _existing) = fixture().await;
        let count_before = fx.store.thread().unwrap().post_count;

        let post = other_post(&fx.thread, None);
        let id = post.id;
        let outcome = fx.store.apply_event(ServerEvent::NewPost { post });

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(fx.store.tree().roots()[0], id, "new posts prepend");
        assert_eq!(fx.store.thread().unwrap().post_count, count_before + 1);
    }

    #[tokio::test]
    async fn test_new_post_twice_is_idempotent() {
        let (mut fx, _existing) = fixture().await;
        let post = other_post(&fx.thread, None);

        fx.store.apply_event(ServerEvent::NewPost { post: post.clone() });
        let len_after_first = fx.store.tree().len();
        let count_after_first = fx.store.thread().unwrap().post_count;

        let second = fx.store.apply_event(ServerEvent::NewPost { post });
        assert_eq!(second, ApplyOutcome::Skipped(SkipReason::DuplicatePost));
        assert_eq!(fx.store.tree().len(), len_after_first);
        assert_eq!(fx.store.thread().unwrap().post_count, count_after_first);
    }

    #[tokio::test]
    async fn test_self_originated_new_post_dropped() {
        let (mut fx, _existing) = fixture().await;

        // Current user creates a post optimistically...
        let id = fx.store.create_post("hello", None, None).await.unwrap();
        assert_eq!(fx.store.thread().unwrap().post_count, 2);

        // ...then the push for the same post arrives, authored by them.
        let echoed = fx.store.tree().post(id).cloned().unwrap();
        let outcome = fx.store.apply_event(ServerEvent::NewPost { post: echoed });

        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::SelfOriginated));
        let copies = fx
            .store
            .tree()
            .roots()
            .iter()
            .filter(|r| **r == id)
            .count();
        assert_eq!(copies, 1, "exactly one copy of the optimistic post");
        assert_eq!(fx.store.thread().unwrap().post_count, 2, "no double count");
    }

    #[tokio::test]
    async fn test_reply_event_increments_summary() {
        let (mut fx, existing) = fixture().await;
        let reply = other_post(&fx.thread, Some(existing));

        let outcome = fx.store.apply_event(ServerEvent::NewPost { post: reply });
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(fx.store.tree().children(existing).len(), 1);
        assert_eq!(fx.store.tree().post(existing).unwrap().reply_count, 1);
    }

    #[tokio::test]
    async fn test_reply_to_unloaded_parent_discarded_no_orphan() {
        let (mut fx, _existing) = fixture().await;
        let reply = other_post(&fx.thread, Some(PostId::new()));
        let id = reply.id;

        let outcome = fx.store.apply_event(ServerEvent::NewPost { post: reply });
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::ParentNotLoaded));
        assert!(!fx.store.tree().contains(id));
    }

    #[tokio::test]
    async fn test_reply_to_own_post_auto_reveals() {
        let (mut fx, _existing) = fixture().await;
        let mine = fx.store.create_post("my post", None, None).await.unwrap();
        assert!(!fx.store.pagination().is_visible(mine));

        let reply = other_post(&fx.thread, Some(mine));
        fx.store.apply_event(ServerEvent::NewPost { post: reply });

        assert!(
            fx.store.pagination().is_visible(mine),
            "the author should see responses immediately"
        );
    }

    #[tokio::test]
    async fn test_foreign_thread_post_dropped() {
        let (mut fx, _existing) = fixture().await;
        let foreign = Thread::new(ThreadKind::Discussion, ResourceId::new());
        let post = other_post(&foreign, None);

        let outcome = fx.store.apply_event(ServerEvent::NewPost { post });
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::ForeignThread));
    }

    // ── update-post ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_update_merges_and_preserves_replies() {
        let (mut fx, existing) = fixture().await;
        let reply = other_post(&fx.thread, Some(existing));
        fx.store.apply_event(ServerEvent::NewPost { post: reply });

        let author_id = fx.store.tree().post(existing).unwrap().author_id;
        let outcome = fx.store.apply_event(ServerEvent::UpdatePost {
            post_id: existing,
            author_id,
            patch: zadan_types::PostPatch::edit("edited elsewhere"),
        });

        assert_eq!(outcome, ApplyOutcome::Applied);
        let node = fx.store.tree().get(existing).unwrap();
        assert_eq!(node.post.content, "edited elsewhere");
        assert!(node.post.edited);
        assert_eq!(node.child_ids.len(), 1, "subtree survives the merge");
    }

    #[tokio::test]
    async fn test_update_for_unknown_post_dropped() {
        let (mut fx, _existing) = fixture().await;
        let outcome = fx.store.apply_event(ServerEvent::UpdatePost {
            post_id: PostId::new(),
            author_id: UserId::new(),
            patch: zadan_types::PostPatch::edit("ghost"),
        });
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::UnknownPost));
    }

    // ── delete-post ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_prunes_and_decrements() {
        let (mut fx, existing) = fixture().await;
        let reply = other_post(&fx.thread, Some(existing));
        let reply_id = reply.id;
        fx.store.apply_event(ServerEvent::NewPost { post: reply });
        let count_before = fx.store.thread().unwrap().post_count;

        let outcome = fx
            .store
            .apply_event(ServerEvent::DeletePost { post_id: existing });

        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(!fx.store.tree().contains(existing));
        assert!(!fx.store.tree().contains(reply_id), "subtree pruned too");
        assert_eq!(fx.store.thread().unwrap().post_count, count_before - 1);
    }

    #[tokio::test]
    async fn test_delete_absent_post_is_noop() {
        let (mut fx, _existing) = fixture().await;
        let count_before = fx.store.thread().unwrap().post_count;
        let len_before = fx.store.tree().len();

        let outcome = fx.store.apply_event(ServerEvent::DeletePost {
            post_id: PostId::new(),
        });

        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::UnknownPost));
        assert_eq!(fx.store.tree().len(), len_before);
        assert_eq!(fx.store.thread().unwrap().post_count, count_before);
    }

    // ── reactions ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reaction_events_flow_through_aggregator() {
        let (mut fx, existing) = fixture().await;
        let reactor = UserId::new();
        let reaction = Reaction::new(existing, reactor, ReactionKind::Like);
        let reaction_id = reaction.id;

        fx.store.apply_event(ServerEvent::NewReaction { reaction });
        let post = fx.store.tree().post(existing).unwrap();
        assert_eq!(post.reaction_counts.count(ReactionKind::Like), 1);
        assert_eq!(post.reaction_counts.total, 1);

        // Same user switches kinds.
        let mut switched = Reaction::new(existing, reactor, ReactionKind::Love);
        switched.id = reaction_id;
        fx.store
            .apply_event(ServerEvent::UpdateReaction { reaction: switched });
        let post = fx.store.tree().post(existing).unwrap();
        assert_eq!(post.reaction_counts.count(ReactionKind::Like), 0);
        assert_eq!(post.reaction_counts.count(ReactionKind::Love), 1);
        assert_eq!(post.reaction_counts.total, 1, "a switch never inflates total");

        fx.store.apply_event(ServerEvent::DeleteReaction {
            reaction_id,
            post_id: existing,
        });
        let post = fx.store.tree().post(existing).unwrap();
        assert_eq!(post.reaction_counts.total, 0);
        assert!(post.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_reaction_for_unloaded_post_dropped_silently() {
        let (mut fx, _existing) = fixture().await;
        let reaction = Reaction::new(PostId::new(), UserId::new(), ReactionKind::Wow);
        let outcome = fx.store.apply_event(ServerEvent::NewReaction { reaction });
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::UnknownPost));
    }

    #[tokio::test]
    async fn test_self_reaction_event_dropped() {
        let (mut fx, existing) = fixture().await;
        fx.store.react(existing, ReactionKind::Like).await.unwrap();

        // The push echo of our own reaction arrives.
        let echo = Reaction::new(existing, fx.me.user_id, ReactionKind::Like);
        let outcome = fx.store.apply_event(ServerEvent::NewReaction { reaction: echo });

        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::SelfOriginated));
        let post = fx.store.tree().post(existing).unwrap();
        assert_eq!(post.reactions.len(), 1, "no duplicate record");
        assert_eq!(post.reaction_counts.total, 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_reaction_is_noop() {
        let (mut fx, existing) = fixture().await;
        let outcome = fx.store.apply_event(ServerEvent::DeleteReaction {
            reaction_id: zadan_types::ReactionId::new(),
            post_id: existing,
        });
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::UnknownReaction));
    }

    // ── presence ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_thread_users_replaces_wholesale() {
        let (mut fx, _existing) = fixture().await;
        fx.store.apply_event(ServerEvent::UserJoined {
            user: ThreadUser {
                user_id: UserId::new(),
                user_name: "Stale".to_string(),
            },
        });

        let fresh = vec![
            ThreadUser {
                user_id: UserId::new(),
                user_name: "Dora".to_string(),
            },
            ThreadUser {
                user_id: UserId::new(),
                user_name: "Eve".to_string(),
            },
        ];
        fx.store.apply_event(ServerEvent::ThreadUsers {
            thread_id: fx.thread.id,
            users: fresh.clone(),
        });

        assert_eq!(fx.store.presence(), fresh.as_slice());
    }

    #[tokio::test]
    async fn test_user_joined_upserts_by_id() {
        let (mut fx, _existing) = fixture().await;
        let user_id = UserId::new();
        fx.store.apply_event(ServerEvent::UserJoined {
            user: ThreadUser {
                user_id,
                user_name: "Frank".to_string(),
            },
        });
        fx.store.apply_event(ServerEvent::UserJoined {
            user: ThreadUser {
                user_id,
                user_name: "Frank F.".to_string(),
            },
        });

        assert_eq!(fx.store.presence().len(), 1);
        assert_eq!(fx.store.presence()[0].user_name, "Frank F.");
    }

    #[tokio::test]
    async fn test_foreign_thread_presence_dropped() {
        let (mut fx, _existing) = fixture().await;
        let outcome = fx.store.apply_event(ServerEvent::ThreadUsers {
            thread_id: ThreadId::new(),
            users: vec![],
        });
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::ForeignThread));
    }

    // ── through the transport ───────────────────────────────────────────

    #[tokio::test]
    async fn test_pump_applies_pushed_events_in_order() {
        let (mut fx, existing) = fixture().await;
        let reply = other_post(&fx.thread, Some(existing));
        let reply_id = reply.id;

        fx.harness.push_server(ServerEvent::NewPost { post: reply });
        fx.harness.push_server(ServerEvent::DeletePost { post_id: reply_id });
        let handled = fx.store.pump_events();

        assert_eq!(handled, 2);
        assert!(!fx.store.tree().contains(reply_id));
        assert_eq!(fx.store.tree().post(existing).unwrap().reply_count, 0);
    }
}
