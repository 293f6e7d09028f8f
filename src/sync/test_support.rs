//! A backend wrapper that fails chosen operations, holds others until
//! released, and counts calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::models::{CommunityPost, PostComment, Recipe, RecipeCollection, Review};
use crate::remote::{DocumentStore, RemoteError, RemoteResult, RemoteStore};

pub struct FlakyRemote {
    inner: DocumentStore,
    failing: Mutex<HashSet<&'static str>>,
    held: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FlakyRemote {
    pub fn new(inner: DocumentStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            held: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Direct access that bypasses failure injection and counting.
    pub fn inner(&self) -> &DocumentStore {
        &self.inner
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Makes calls to `op` wait until [`FlakyRemote::release`].
    pub fn hold(&self, op: &'static str) {
        self.held
            .lock()
            .unwrap()
            .insert(op, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: &'static str) {
        if let Some(gate) = self.held.lock().unwrap().remove(op) {
            // Closing wakes every waiter
            gate.close();
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    async fn enter(&self, op: &'static str) -> RemoteResult<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;

        let gate = self.held.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }

        if self.failing.lock().unwrap().contains(op) {
            return Err(RemoteError::Unavailable(format!("{} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for FlakyRemote {
    async fn fetch_all_recipes(&self) -> RemoteResult<Vec<Recipe>> {
        self.enter("fetch_all_recipes").await?;
        self.inner.fetch_all_recipes().await
    }

    async fn fetch_recipe_by_id(&self, id: &str) -> RemoteResult<Option<Recipe>> {
        self.enter("fetch_recipe_by_id").await?;
        self.inner.fetch_recipe_by_id(id).await
    }

    async fn add_recipe(&self, recipe: &Recipe) -> RemoteResult<String> {
        self.enter("add_recipe").await?;
        self.inner.add_recipe(recipe).await
    }

    async fn fetch_all_collections(&self, owner_id: &str) -> RemoteResult<Vec<RecipeCollection>> {
        self.enter("fetch_all_collections").await?;
        self.inner.fetch_all_collections(owner_id).await
    }

    async fn fetch_collection(
        &self,
        owner_id: &str,
        collection_id: &str,
    ) -> RemoteResult<Option<RecipeCollection>> {
        self.enter("fetch_collection").await?;
        self.inner.fetch_collection(owner_id, collection_id).await
    }

    async fn create_collection(&self, owner_id: &str, name: &str) -> RemoteResult<String> {
        self.enter("create_collection").await?;
        self.inner.create_collection(owner_id, name).await
    }

    async fn update_collection_recipe_ids(
        &self,
        owner_id: &str,
        collection_id: &str,
        recipe_ids: &[String],
    ) -> RemoteResult<()> {
        self.enter("update_collection_recipe_ids").await?;
        self.inner
            .update_collection_recipe_ids(owner_id, collection_id, recipe_ids)
            .await
    }

    async fn delete_collection(&self, owner_id: &str, collection_id: &str) -> RemoteResult<()> {
        self.enter("delete_collection").await?;
        self.inner.delete_collection(owner_id, collection_id).await
    }

    async fn fetch_favorites(&self, owner_id: &str) -> RemoteResult<Vec<Recipe>> {
        self.enter("fetch_favorites").await?;
        self.inner.fetch_favorites(owner_id).await
    }

    async fn set_favorite(
        &self,
        owner_id: &str,
        recipe: &Recipe,
        present: bool,
    ) -> RemoteResult<()> {
        self.enter("set_favorite").await?;
        self.inner.set_favorite(owner_id, recipe, present).await
    }

    async fn fetch_reviews(&self, recipe_id: &str) -> RemoteResult<Vec<Review>> {
        self.enter("fetch_reviews").await?;
        self.inner.fetch_reviews(recipe_id).await
    }

    async fn submit_review(&self, review: &Review) -> RemoteResult<Review> {
        self.enter("submit_review").await?;
        self.inner.submit_review(review).await
    }

    async fn fetch_posts(
        &self,
        limit: usize,
        before: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<CommunityPost>> {
        self.enter("fetch_posts").await?;
        self.inner.fetch_posts(limit, before).await
    }

    async fn create_post(&self, post: &CommunityPost) -> RemoteResult<CommunityPost> {
        self.enter("create_post").await?;
        self.inner.create_post(post).await
    }

    async fn liked_post_ids(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> RemoteResult<BTreeSet<String>> {
        self.enter("liked_post_ids").await?;
        self.inner.liked_post_ids(user_id, post_ids).await
    }

    async fn set_like(&self, post_id: &str, user_id: &str, liked: bool) -> RemoteResult<()> {
        self.enter("set_like").await?;
        self.inner.set_like(post_id, user_id, liked).await
    }

    async fn fetch_comments(&self, post_id: &str) -> RemoteResult<Vec<PostComment>> {
        self.enter("fetch_comments").await?;
        self.inner.fetch_comments(post_id).await
    }

    async fn add_comment(&self, comment: &PostComment) -> RemoteResult<PostComment> {
        self.enter("add_comment").await?;
        self.inner.add_comment(comment).await
    }
}
