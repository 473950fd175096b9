//! The discussion store: one facade bundling the post tree, pagination,
//! presence, the review gate, and the connection manager.
//!
//! Every user action follows the same shape: mutate locally first (the UI
//! reflects the action immediately, and a racing push event for the same
//! logical change is recognizable as self-originated), then confirm over
//! REST and merge the authoritative record — or revert the specific change
//! on failure, falling back to a page refetch where precise reversal is
//! impractical.
//!
//! Every in-flight request snapshots the store's fetch *epoch* at dispatch.
//! Switching threads bumps the epoch, so a stale response from the previous
//! thread resolves into a discard instead of mutating the new tree.
//!
//! Mutations run to completion within one call — the embedder drains push
//! events between actions via [`DiscussionStore::pump_events`], in delivery
//! order, which is what makes the reconciler's existence/absence checks
//! sufficient for idempotence.

use std::sync::Arc;

use tokio::sync::broadcast;

use zadan_store::{DEFAULT_REPLY_PAGE_SIZE, PostTree, ReplyPagination, ToggleOutcome};
use zadan_types::{
    Identity, Post, PostId, PostPatch, Reaction, ReactionKind, Thread, ThreadId, ThreadUser,
};

use crate::api::{ApiError, DiscussionApi};
use crate::connection::{ConnectionManager, JoinIdentity};
use crate::error::ClientError;
use crate::persist::DurableSession;
use crate::review::ReviewGate;
use crate::transport::{ThreadTransport, TransportEvent};

/// Top-level posts fetched per page unless configured otherwise.
pub const DEFAULT_POST_PAGE_SIZE: u32 = 10;

/// Page-size knobs.
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    pub post_page_size: u32,
    pub reply_page_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            post_page_size: DEFAULT_POST_PAGE_SIZE,
            reply_page_size: DEFAULT_REPLY_PAGE_SIZE,
        }
    }
}

/// Client-resident state for one active discussion thread.
pub struct DiscussionStore {
    pub(crate) api: Arc<dyn DiscussionApi>,
    pub(crate) connection: ConnectionManager,
    events_rx: broadcast::Receiver<TransportEvent>,

    pub(crate) identity: Option<Identity>,
    pub(crate) thread: Option<Thread>,
    pub(crate) tree: PostTree,
    pub(crate) pagination: ReplyPagination,
    pub(crate) presence: Vec<ThreadUser>,
    pub(crate) review: ReviewGate,

    post_page_size: u32,
    post_pages_loaded: u32,
    posts_exhausted: bool,
    last_fetched: Option<(ThreadId, zadan_types::UserId)>,

    /// Bumped on every thread switch; stale responses compare against it.
    epoch: u64,
    /// Bumped on every visible mutation — UI change detection.
    version: u64,
    loading: bool,
    last_error: Option<ClientError>,
}

impl DiscussionStore {
    pub fn new(
        api: Arc<dyn DiscussionApi>,
        transport: Box<dyn ThreadTransport>,
        config: StoreConfig,
    ) -> Self {
        let events_rx = transport.subscribe();
        Self {
            api,
            connection: ConnectionManager::new(transport),
            events_rx,
            identity: None,
            thread: None,
            tree: PostTree::new(),
            pagination: ReplyPagination::new(config.reply_page_size),
            presence: Vec::new(),
            review: ReviewGate::default(),
            post_page_size: config.post_page_size.max(1),
            post_pages_loaded: 0,
            posts_exhausted: false,
            last_fetched: None,
            epoch: 0,
            version: 0,
            loading: false,
            last_error: None,
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.thread.as_ref()
    }

    pub fn tree(&self) -> &PostTree {
        &self.tree
    }

    pub fn pagination(&self) -> &ReplyPagination {
        &self.pagination
    }

    /// Participants currently viewing the thread.
    pub fn presence(&self) -> &[ThreadUser] {
        &self.presence
    }

    pub fn review_gate(&self) -> &ReviewGate {
        &self.review
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    /// Change-detection counter; bumped on every visible mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Consume the pending error (the UI shows it once as a toast).
    pub fn take_error(&mut self) -> Option<ClientError> {
        self.last_error.take()
    }

    // =========================================================================
    // Identity & connection
    // =========================================================================

    /// Set the current user. Identity is externally supplied; zadan never
    /// authenticates.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.touch();
    }

    pub fn connect(&mut self) -> Result<(), ClientError> {
        self.connection.connect().map_err(|e| self.fail(e.into()))
    }

    /// Drain pending transport events: connection lifecycle first, then the
    /// reconciler, strictly in delivery order. Returns how many events were
    /// handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("event stream lagged, {n} events dropped");
                    continue;
                }
                Err(_) => break,
            };
            self.connection.handle_event(&event);
            if let TransportEvent::Server(server_event) = event {
                self.apply_event(server_event);
            }
            handled += 1;
        }
        handled
    }

    // =========================================================================
    // Thread lifecycle
    // =========================================================================

    /// Make a thread active: fetch its metadata and first post page, then
    /// announce membership. A repeat call for the `(thread, user)` pair that
    /// was already fetched skips the redundant refetch and just rejoins.
    pub async fn set_active_thread(&mut self, thread_id: ThreadId) -> Result<(), ClientError> {
        let identity = self.require_identity()?;

        if self.last_fetched == Some((thread_id, identity.user_id))
            && self.thread.as_ref().is_some_and(|t| t.id == thread_id)
        {
            self.connection.join_thread(JoinIdentity {
                thread_id,
                user_id: identity.user_id,
                user_name: identity.user_name.clone(),
            });
            return Ok(());
        }

        // Leaving the previous thread is intentional — no auto-rejoin to it.
        if self.thread.is_some() {
            self.connection.leave_thread();
        }

        self.epoch += 1;
        let epoch = self.epoch;
        self.thread = None;
        self.tree = PostTree::new();
        self.pagination.clear();
        self.presence.clear();
        self.review = ReviewGate::default();
        self.post_pages_loaded = 0;
        self.posts_exhausted = false;
        self.loading = true;
        self.touch();

        let thread = match self.api.fetch_thread(thread_id).await {
            Ok(thread) => thread,
            Err(e) => {
                self.loading = false;
                let e = match e {
                    ApiError::NotFound => ClientError::ThreadNotFound,
                    other => other.into(),
                };
                return Err(self.fail(e));
            }
        };
        if self.epoch != epoch {
            return Ok(()); // switched again mid-flight; this result is stale
        }

        let page = match self.api.fetch_posts(thread_id, 1, self.post_page_size).await {
            Ok(page) => page,
            Err(e) => {
                self.loading = false;
                return Err(self.fail(e.into()));
            }
        };
        if self.epoch != epoch {
            return Ok(());
        }

        self.posts_exhausted = (page.len() as u32) < self.post_page_size;
        self.tree.absorb_page(page);
        self.post_pages_loaded = 1;
        self.thread = Some(thread);
        self.last_fetched = Some((thread_id, identity.user_id));
        self.loading = false;
        self.touch();

        self.connection.join_thread(JoinIdentity {
            thread_id,
            user_id: identity.user_id,
            user_name: identity.user_name.clone(),
        });
        Ok(())
    }

    /// Fetch the next page of top-level posts.
    pub async fn load_more_posts(&mut self) -> Result<usize, ClientError> {
        let Some(thread_id) = self.thread.as_ref().map(|t| t.id) else {
            return Err(self.fail(ClientError::NoActiveThread));
        };
        if self.posts_exhausted {
            return Ok(0);
        }
        let page = self.post_pages_loaded + 1;
        let epoch = self.epoch;
        match self.api.fetch_posts(thread_id, page, self.post_page_size).await {
            Ok(posts) => {
                if self.epoch != epoch {
                    return Ok(0);
                }
                let returned = posts.len() as u32;
                let added = self.tree.absorb_page(posts);
                self.post_pages_loaded = page;
                if returned < self.post_page_size {
                    self.posts_exhausted = true;
                }
                self.touch();
                Ok(added)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    // =========================================================================
    // Post actions
    // =========================================================================

    /// Create a post (top-level when `parent_id` is `None`). The insert is
    /// optimistic; replies are depth-clamped by the tree, and the record
    /// actually sent to the server carries the effective parent.
    pub async fn create_post(
        &mut self,
        content: impl Into<String>,
        parent_id: Option<PostId>,
        rating: Option<u8>,
    ) -> Result<PostId, ClientError> {
        let identity = self.require_identity()?;
        let Some(thread) = self.thread.clone() else {
            return Err(self.fail(ClientError::NoActiveThread));
        };

        if thread.is_review() && parent_id.is_none() && rating.is_some() {
            let gate = self
                .review
                .ensure_can_review(
                    self.api.as_ref(),
                    &self.tree,
                    thread.resource_id,
                    identity.user_id,
                )
                .await;
            if let Err(e) = gate {
                return Err(self.fail(e));
            }
        }

        let post = Post::new(thread.id, &identity, content, parent_id, rating);
        let post_id = post.id;

        // Optimistic insert before the await.
        if let Err(e) = self.tree.insert(post.clone()) {
            return Err(self.fail(e.into()));
        }
        let sent = self.tree.post(post_id).cloned().unwrap_or(post);
        match sent.parent_id {
            None => {
                if let Some(t) = self.thread.as_mut() {
                    t.post_count += 1;
                }
            }
            Some(parent) => self.pagination.reveal(parent),
        }
        self.touch();
        let epoch = self.epoch;

        match self.api.create_post(&sent).await {
            Ok(server_post) => {
                if self.epoch == epoch {
                    if sent.is_review() {
                        self.review.mark_reviewed(Some(post_id));
                    }
                    if let Some(node) = self.tree.get_mut(post_id) {
                        node.merge_authoritative(server_post);
                    }
                    self.touch();
                }
                Ok(post_id)
            }
            Err(ApiError::Conflict) if sent.is_review() => {
                // The server already has a review from this user — a state
                // correction, not a generic failure.
                self.review.mark_reviewed(None);
                if self.epoch == epoch {
                    self.rollback_create(&sent);
                    self.resync().await;
                }
                Err(self.fail(ClientError::AlreadyReviewed))
            }
            Err(e) => {
                if self.epoch == epoch {
                    self.rollback_create(&sent);
                }
                Err(self.fail(e.into()))
            }
        }
    }

    /// Edit a post's content (and, for a review, its rating). Reverts to
    /// the pre-edit record on failure.
    pub async fn update_post(
        &mut self,
        post_id: PostId,
        content: impl Into<String>,
        rating: Option<u8>,
    ) -> Result<(), ClientError> {
        let identity = self.require_identity()?;
        let Some(node) = self.tree.get_mut(post_id) else {
            return Err(self.fail(ClientError::PostNotFound(post_id)));
        };

        let previous = node.post.clone();
        let mut patch = PostPatch::edit(content);
        patch.rating = rating;
        node.merge_patch(patch.clone());
        self.touch();
        let epoch = self.epoch;

        match self.api.update_post(post_id, identity.user_id, &patch).await {
            Ok(server_post) => {
                if self.epoch == epoch
                    && let Some(node) = self.tree.get_mut(post_id)
                {
                    node.merge_authoritative(server_post);
                    self.touch();
                }
                Ok(())
            }
            Err(ApiError::NotFound) => {
                // Deleted server-side while we were editing.
                if self.epoch == epoch {
                    self.drop_post_locally(post_id, previous.parent_id.is_none());
                }
                Err(self.fail(ClientError::PostNotFound(post_id)))
            }
            Err(e) => {
                if self.epoch == epoch
                    && let Some(node) = self.tree.get_mut(post_id)
                {
                    node.post = previous;
                    self.touch();
                }
                Err(self.fail(e.into()))
            }
        }
    }

    /// Delete a post and its subtree. The prune is optimistic; precise
    /// reversal is impractical, so a failed delete resynchronizes the
    /// loaded pages instead.
    pub async fn delete_post(&mut self, post_id: PostId) -> Result<(), ClientError> {
        let identity = self.require_identity()?;
        let Some(post) = self.tree.post(post_id).cloned() else {
            return Err(self.fail(ClientError::PostNotFound(post_id)));
        };

        self.drop_post_locally(post_id, post.parent_id.is_none());
        let epoch = self.epoch;

        match self.api.delete_post(post_id, identity.user_id).await {
            Ok(()) => Ok(()),
            // Already gone server-side; the local prune stands.
            Err(ApiError::NotFound) => Ok(()),
            Err(e) => {
                if self.epoch == epoch {
                    self.resync().await;
                }
                Err(self.fail(e.into()))
            }
        }
    }

    // =========================================================================
    // Reaction actions
    // =========================================================================

    /// Add a reaction, or switch kinds if the user already has one on this
    /// post. Reacting with the kind already held is a no-op.
    pub async fn react(&mut self, post_id: PostId, kind: ReactionKind) -> Result<(), ClientError> {
        let identity = self.require_identity()?;
        let Some(node) = self.tree.get_mut(post_id) else {
            return Err(self.fail(ClientError::PostNotFound(post_id)));
        };

        let existing = node.reaction_by_user(identity.user_id).cloned();
        let epoch = self.epoch;
        match existing {
            Some(prior) if prior.kind == kind => Ok(()),
            Some(prior) => {
                let mut switched = prior.clone();
                switched.kind = kind;
                switched.updated_at = zadan_types::now_millis();
                node.set_reaction(switched);
                self.touch();

                match self.api.update_reaction(prior.id, kind).await {
                    Ok(server) => {
                        if self.epoch == epoch
                            && let Some(node) = self.tree.get_mut(post_id)
                        {
                            node.set_reaction(server);
                            self.touch();
                        }
                        Ok(())
                    }
                    Err(e) => {
                        if self.epoch == epoch
                            && let Some(node) = self.tree.get_mut(post_id)
                        {
                            node.set_reaction(prior);
                            self.touch();
                        }
                        Err(self.fail(e.into()))
                    }
                }
            }
            None => {
                let reaction = Reaction::new(post_id, identity.user_id, kind);
                let local_id = reaction.id;
                node.set_reaction(reaction.clone());
                self.touch();

                match self.api.create_reaction(&reaction).await {
                    Ok(server) => {
                        if self.epoch == epoch
                            && let Some(node) = self.tree.get_mut(post_id)
                        {
                            if server.id != local_id {
                                node.remove_reaction(local_id);
                            }
                            node.set_reaction(server);
                            self.touch();
                        }
                        Ok(())
                    }
                    Err(e) => {
                        if self.epoch == epoch
                            && let Some(node) = self.tree.get_mut(post_id)
                        {
                            node.remove_reaction(local_id);
                            self.touch();
                        }
                        Err(self.fail(e.into()))
                    }
                }
            }
        }
    }

    /// Retract the user's reaction from a post. No reaction is a no-op.
    pub async fn unreact(&mut self, post_id: PostId) -> Result<(), ClientError> {
        let identity = self.require_identity()?;
        let Some(node) = self.tree.get_mut(post_id) else {
            return Err(self.fail(ClientError::PostNotFound(post_id)));
        };
        let Some(removed) = node.remove_reaction_by_user(identity.user_id) else {
            return Ok(());
        };
        self.touch();
        let epoch = self.epoch;

        match self.api.delete_reaction(removed.id).await {
            Ok(()) => Ok(()),
            Err(ApiError::NotFound) => Ok(()),
            Err(e) => {
                if self.epoch == epoch
                    && let Some(node) = self.tree.get_mut(post_id)
                {
                    node.set_reaction(removed);
                    self.touch();
                }
                Err(self.fail(e.into()))
            }
        }
    }

    // =========================================================================
    // Replies
    // =========================================================================

    /// Show or hide a post's replies. The first reveal fetches page 1.
    pub async fn toggle_replies(&mut self, post_id: PostId) -> Result<(), ClientError> {
        if !self.tree.contains(post_id) {
            return Err(self.fail(ClientError::PostNotFound(post_id)));
        }
        match self.pagination.toggle(post_id) {
            ToggleOutcome::ShownNeedsFetch => {
                self.touch();
                self.fetch_reply_page(post_id, 1).await.map(|_| ())
            }
            ToggleOutcome::Shown | ToggleOutcome::Hidden => {
                self.touch();
                Ok(())
            }
        }
    }

    /// Fetch the next reply page for a post. Returns how many replies were
    /// added; 0 when everything is already loaded.
    pub async fn load_more_replies(&mut self, post_id: PostId) -> Result<usize, ClientError> {
        let Some(node) = self.tree.get(post_id) else {
            return Err(self.fail(ClientError::PostNotFound(post_id)));
        };
        let loaded = node.loaded_reply_count();
        let total = node.post.reply_count;
        if !self.pagination.has_more(post_id, loaded, total) {
            return Ok(0);
        }
        let page = self.pagination.next_page(loaded);
        self.fetch_reply_page(post_id, page).await
    }

    async fn fetch_reply_page(&mut self, post_id: PostId, page: u32) -> Result<usize, ClientError> {
        let epoch = self.epoch;
        let limit = self.pagination.page_size();
        match self.api.fetch_replies(post_id, page, limit).await {
            Ok(posts) => {
                if self.epoch != epoch {
                    return Ok(0);
                }
                let returned = posts.len();
                let added = self.tree.absorb_page(posts);
                self.pagination.record_page(post_id, page, returned);
                self.touch();
                Ok(added)
            }
            Err(ApiError::NotFound) => {
                if self.epoch == epoch {
                    self.drop_post_locally(post_id, self.tree.post(post_id)
                        .is_some_and(|p| p.parent_id.is_none()));
                }
                Err(self.fail(ClientError::PostNotFound(post_id)))
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    // =========================================================================
    // Durable session
    // =========================================================================

    /// Snapshot the durable half of the store — see
    /// [`DurableSession`](crate::persist::DurableSession) for what that
    /// includes (and deliberately excludes).
    pub fn durable_session(&self) -> DurableSession {
        DurableSession {
            identity: self.identity.clone(),
            thread: self.thread.clone(),
            posts: self.tree.flatten(),
            reply_pages: self.pagination.snapshot_states(),
            post_pages_loaded: self.post_pages_loaded,
            posts_exhausted: self.posts_exhausted,
            has_reviewed: self.review.has_reviewed,
            review_id: self.review.review_id,
            last_fetched: self.last_fetched,
        }
    }

    /// Rebuild from a cached session. Live state (connection, presence,
    /// loading flags) is reset to defaults — it is never part of the cache.
    pub fn restore_session(&mut self, session: DurableSession) {
        self.identity = session.identity;
        self.thread = session.thread;
        self.tree = PostTree::from_posts(session.posts);
        self.pagination.clear();
        self.pagination.restore_states(session.reply_pages);
        self.post_pages_loaded = session.post_pages_loaded;
        self.posts_exhausted = session.posts_exhausted;
        self.review = ReviewGate {
            has_reviewed: session.has_reviewed,
            review_id: session.review_id,
        };
        self.last_fetched = session.last_fetched;

        self.presence.clear();
        self.loading = false;
        self.last_error = None;
        self.epoch += 1;
        self.touch();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    fn require_identity(&mut self) -> Result<Identity, ClientError> {
        match self.identity.clone() {
            Some(identity) => Ok(identity),
            None => Err(self.fail(ClientError::NotSignedIn)),
        }
    }

    /// Record a recoverable failure in the store-level slot and hand it back.
    fn fail(&mut self, error: ClientError) -> ClientError {
        self.last_error = Some(error.clone());
        self.touch();
        error
    }

    /// Remove a post from all local structures (tree, pagination, counters).
    fn drop_post_locally(&mut self, post_id: PostId, was_top_level: bool) {
        let removed = self.tree.remove(post_id);
        if removed.is_empty() {
            return;
        }
        self.pagination.purge(&removed);
        if was_top_level
            && let Some(t) = self.thread.as_mut()
        {
            t.post_count = t.post_count.saturating_sub(1);
        }
        self.touch();
    }

    fn rollback_create(&mut self, sent: &Post) {
        self.drop_post_locally(sent.id, sent.parent_id.is_none());
    }

    /// Refetch the loaded top-level pages wholesale — the recovery path when
    /// a specific reversal isn't possible.
    async fn resync(&mut self) {
        let Some(thread_id) = self.thread.as_ref().map(|t| t.id) else {
            return;
        };
        let epoch = self.epoch;
        let limit = self.post_page_size * self.post_pages_loaded.max(1);
        match self.api.fetch_posts(thread_id, 1, limit).await {
            Ok(posts) => {
                if self.epoch != epoch {
                    return;
                }
                self.posts_exhausted = (posts.len() as u32) < limit;
                self.tree = PostTree::from_posts(posts);
                self.pagination.clear();
                if let Ok(thread) = self.api.fetch_thread(thread_id).await
                    && self.epoch == epoch
                {
                    self.thread = Some(thread);
                }
                self.touch();
            }
            Err(e) => tracing::warn!("resync after failed delete came up empty: {e}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
