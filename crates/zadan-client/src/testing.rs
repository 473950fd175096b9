//! In-memory `DiscussionApi` double for unit tests.
//!
//! Records every call by method name (so tests can assert a path never hit
//! the network), serves seeded threads/posts/replies in pages, echoes
//! creates back the way the real API does, and can be scripted to fail the
//! next call to a given method.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use zadan_types::{
    Post, PostId, PostPatch, Reaction, ReactionId, ReactionKind, ResourceId, Thread, ThreadId,
    UserId,
};

use crate::api::{ApiError, DiscussionApi, ReviewStatus};

#[derive(Default)]
struct Inner {
    threads: HashMap<ThreadId, Thread>,
    /// Top-level pages, newest first, keyed by thread.
    posts: HashMap<ThreadId, Vec<Post>>,
    /// Reply pages, oldest first, keyed by parent post.
    replies: HashMap<PostId, Vec<Post>>,
    /// Every post the mock has seen, for update lookups.
    by_id: HashMap<PostId, Post>,
    reactions: HashMap<ReactionId, Reaction>,
    review_status: ReviewStatus,
    /// Method name → error for the next call to it.
    failures: HashMap<&'static str, ApiError>,
    calls: Vec<&'static str>,
}

pub(crate) struct MockApi {
    inner: Mutex<Inner>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn seed_thread(&self, thread: Thread) {
        self.inner.lock().unwrap().threads.insert(thread.id, thread);
    }

    pub fn seed_posts(&self, thread_id: ThreadId, posts: Vec<Post>) {
        let mut inner = self.inner.lock().unwrap();
        for post in &posts {
            inner.by_id.insert(post.id, post.clone());
            for r in &post.reactions {
                inner.reactions.insert(r.id, r.clone());
            }
        }
        inner.posts.insert(thread_id, posts);
    }

    pub fn seed_replies(&self, parent_id: PostId, posts: Vec<Post>) {
        let mut inner = self.inner.lock().unwrap();
        for post in &posts {
            inner.by_id.insert(post.id, post.clone());
        }
        inner.replies.insert(parent_id, posts);
    }

    pub fn set_review_status(&self, status: ReviewStatus) {
        self.inner.lock().unwrap().review_status = status;
    }

    /// Fail the next call to `method` with `error`.
    pub fn fail_next(&self, method: &'static str, error: ApiError) {
        self.inner.lock().unwrap().failures.insert(method, error);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn enter(&self, method: &'static str) -> Result<std::sync::MutexGuard<'_, Inner>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(method);
        if let Some(error) = inner.failures.remove(method) {
            return Err(error);
        }
        Ok(inner)
    }
}

fn page_slice(items: &[Post], page: u32, limit: u32) -> Vec<Post> {
    let start = (page.saturating_sub(1) * limit) as usize;
    items.iter().skip(start).take(limit as usize).cloned().collect()
}

#[async_trait]
impl DiscussionApi for MockApi {
    async fn fetch_thread(&self, thread_id: ThreadId) -> Result<Thread, ApiError> {
        let inner = self.enter("fetch_thread")?;
        inner.threads.get(&thread_id).cloned().ok_or(ApiError::NotFound)
    }

    async fn fetch_posts(
        &self,
        thread_id: ThreadId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ApiError> {
        let inner = self.enter("fetch_posts")?;
        Ok(inner
            .posts
            .get(&thread_id)
            .map(|posts| page_slice(posts, page, limit))
            .unwrap_or_default())
    }

    async fn fetch_replies(
        &self,
        post_id: PostId,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Post>, ApiError> {
        let inner = self.enter("fetch_replies")?;
        Ok(inner
            .replies
            .get(&post_id)
            .map(|posts| page_slice(posts, page, limit))
            .unwrap_or_default())
    }

    async fn create_post(&self, post: &Post) -> Result<Post, ApiError> {
        let mut inner = self.enter("create_post")?;
        inner.by_id.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn update_post(
        &self,
        post_id: PostId,
        _author_id: UserId,
        patch: &PostPatch,
    ) -> Result<Post, ApiError> {
        let mut inner = self.enter("update_post")?;
        let Some(post) = inner.by_id.get_mut(&post_id) else {
            return Err(ApiError::NotFound);
        };
        if let Some(content) = &patch.content {
            post.content = content.clone();
        }
        if let Some(rating) = patch.rating {
            post.rating = Some(rating);
        }
        if let Some(edited) = patch.edited {
            post.edited = edited;
        }
        if let Some(updated_at) = patch.updated_at {
            post.updated_at = updated_at;
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, post_id: PostId, _author_id: UserId) -> Result<(), ApiError> {
        let mut inner = self.enter("delete_post")?;
        inner.by_id.remove(&post_id);
        Ok(())
    }

    async fn create_reaction(&self, reaction: &Reaction) -> Result<Reaction, ApiError> {
        let mut inner = self.enter("create_reaction")?;
        inner.reactions.insert(reaction.id, reaction.clone());
        Ok(reaction.clone())
    }

    async fn update_reaction(
        &self,
        reaction_id: ReactionId,
        kind: ReactionKind,
    ) -> Result<Reaction, ApiError> {
        let mut inner = self.enter("update_reaction")?;
        let Some(reaction) = inner.reactions.get_mut(&reaction_id) else {
            return Err(ApiError::NotFound);
        };
        reaction.kind = kind;
        reaction.updated_at = zadan_types::now_millis();
        Ok(reaction.clone())
    }

    async fn delete_reaction(&self, reaction_id: ReactionId) -> Result<(), ApiError> {
        let mut inner = self.enter("delete_reaction")?;
        inner.reactions.remove(&reaction_id);
        Ok(())
    }

    async fn check_user_review(
        &self,
        _resource_id: ResourceId,
        _user_id: UserId,
    ) -> Result<ReviewStatus, ApiError> {
        let inner = self.enter("check_user_review")?;
        Ok(inner.review_status.clone())
    }
}
