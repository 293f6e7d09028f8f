//! Client side of the managed document backend.
//!
//! The backend stores documents under these paths:
//! - `recipes/{id}`: public recipes, with aggregate review stats
//! - `recipes/{id}/reviews/{review_id}`: reviews of one recipe
//! - `users/{uid}/collections/{collection_id}`: a user's collections
//! - `users/{uid}/favorites/{recipe_id}`: snapshots of favorited recipes
//! - `posts/{id}`: community feed posts, with like and comment counters
//! - `posts/{id}/likes/{uid}`: one document per user who liked the post
//! - `posts/{id}/comments/{comment_id}`: comments on a post
//!
//! [`RemoteStore`] is the interface the sync layer consumes;
//! [`DocumentStore`] is the in-process implementation used by the CLI and
//! by tests.

mod auth;
pub mod document;
mod memory;

pub use auth::{AuthProvider, StaticAuth};
pub use memory::DocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::{CommunityPost, PostComment, Recipe, RecipeCollection, Review};

/// Author stamped on recipes brought in by a bulk import.
pub const IMPORT_AUTHOR: &str = "Culinary Companion";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Malformed document {0}")]
    Decode(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All recipes, ordered by title.
    async fn fetch_all_recipes(&self) -> RemoteResult<Vec<Recipe>>;

    async fn fetch_recipe_by_id(&self, id: &str) -> RemoteResult<Option<Recipe>>;

    /// Stores a new recipe and returns its backend-assigned id.
    async fn add_recipe(&self, recipe: &Recipe) -> RemoteResult<String>;

    async fn fetch_all_collections(&self, owner_id: &str) -> RemoteResult<Vec<RecipeCollection>>;

    async fn fetch_collection(
        &self,
        owner_id: &str,
        collection_id: &str,
    ) -> RemoteResult<Option<RecipeCollection>>;

    /// Creates an empty collection and returns its backend-assigned id.
    async fn create_collection(&self, owner_id: &str, name: &str) -> RemoteResult<String>;

    /// Fails with `NotFound` when the collection does not exist.
    async fn update_collection_recipe_ids(
        &self,
        owner_id: &str,
        collection_id: &str,
        recipe_ids: &[String],
    ) -> RemoteResult<()>;

    /// Deleting an absent collection succeeds.
    async fn delete_collection(&self, owner_id: &str, collection_id: &str) -> RemoteResult<()>;

    async fn fetch_favorites(&self, owner_id: &str) -> RemoteResult<Vec<Recipe>>;

    async fn set_favorite(&self, owner_id: &str, recipe: &Recipe, present: bool)
        -> RemoteResult<()>;

    /// Reviews of a recipe, newest first.
    async fn fetch_reviews(&self, recipe_id: &str) -> RemoteResult<Vec<Review>>;

    /// Atomically stores the review and folds its rating into the recipe's
    /// stats. Returns the stored review with its assigned id.
    async fn submit_review(&self, review: &Review) -> RemoteResult<Review>;

    /// Posts newest first, at most `limit` of them. With `before`, only
    /// posts strictly older than it are returned.
    async fn fetch_posts(
        &self,
        limit: usize,
        before: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<CommunityPost>>;

    /// Stores a new post and returns it with its backend-assigned id.
    async fn create_post(&self, post: &CommunityPost) -> RemoteResult<CommunityPost>;

    /// The subset of `post_ids` that `user_id` has liked.
    async fn liked_post_ids(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> RemoteResult<BTreeSet<String>>;

    /// Atomically records or removes the user's like and moves the post's
    /// like count with it. Asking for the state the like is already in
    /// changes nothing. Fails with `NotFound` when the post does not exist.
    async fn set_like(&self, post_id: &str, user_id: &str, liked: bool) -> RemoteResult<()>;

    /// Comments on a post, oldest first.
    async fn fetch_comments(&self, post_id: &str) -> RemoteResult<Vec<PostComment>>;

    /// Atomically stores the comment and increments the post's comment
    /// count. Returns the stored comment with its assigned id.
    async fn add_comment(&self, comment: &PostComment) -> RemoteResult<PostComment>;
}

/// Imports raw recipe documents, as exported from a seed file.
///
/// Each document is decoded with the regular defaults, stamped with the
/// import author and zeroed review stats, and added as a new recipe.
/// Returns the assigned ids in input order.
pub async fn import_recipe_documents(
    store: &dyn RemoteStore,
    documents: &[Value],
) -> RemoteResult<Vec<String>> {
    let mut ids = Vec::with_capacity(documents.len());
    for (i, doc) in documents.iter().enumerate() {
        let mut recipe = document::decode_recipe(&format!("import[{}]", i), doc)?;
        recipe.id = String::new();
        recipe.author = IMPORT_AUTHOR.to_string();
        recipe.stats = Default::default();
        recipe.is_favorite = false;
        let now = chrono::Utc::now();
        recipe.created_at = now;
        recipe.updated_at = now;

        ids.push(store.add_recipe(&recipe).await?);
    }
    tracing::info!("Imported {} recipe(s)", ids.len());
    Ok(ids)
}
