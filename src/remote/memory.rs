//! In-process document backend.
//!
//! Documents live in one ordered map keyed by their full path. Each call
//! holds the store lock for its whole duration, so multi-document writes
//! (the review transaction) are all-or-nothing. When opened from a file, the
//! map is written back as a JSON snapshot after every write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::document::{
    decode_collection, decode_comment, decode_post, decode_recipe, decode_review,
    encode_collection, encode_comment, encode_post, encode_recipe, encode_review,
};
use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{CommunityPost, PostComment, Recipe, RecipeCollection, Review};

type Documents = BTreeMap<String, Value>;

pub struct DocumentStore {
    docs: Mutex<Documents>,
    snapshot_path: Option<PathBuf>,
}

fn recipe_path(id: &str) -> String {
    format!("recipes/{}", id)
}

fn reviews_path(recipe_id: &str) -> String {
    format!("recipes/{}/reviews", recipe_id)
}

fn collections_path(owner_id: &str) -> String {
    format!("users/{}/collections", owner_id)
}

fn favorites_path(owner_id: &str) -> String {
    format!("users/{}/favorites", owner_id)
}

fn post_path(id: &str) -> String {
    format!("posts/{}", id)
}

fn like_path(post_id: &str, user_id: &str) -> String {
    format!("posts/{}/likes/{}", post_id, user_id)
}

fn comments_path(post_id: &str) -> String {
    format!("posts/{}/comments", post_id)
}

/// The stored post `post_id`, or `NotFound`.
fn existing_post(docs: &Documents, post_id: &str) -> RemoteResult<CommunityPost> {
    let path = post_path(post_id);
    let doc = docs
        .get(&path)
        .ok_or_else(|| RemoteError::NotFound(path.clone()))?;
    decode_post(post_id, doc)
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Documents directly inside `collection`, as (id, document) pairs.
fn children<'a>(docs: &'a Documents, collection: &str) -> Vec<(&'a str, &'a Value)> {
    let prefix = format!("{}/", collection);
    docs.range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter_map(|(path, doc)| {
            let id = &path[prefix.len()..];
            (!id.contains('/')).then_some((id, doc))
        })
        .collect()
}

/// Decodes every child, skipping (and logging) malformed documents.
fn decode_children<T>(
    docs: &Documents,
    collection: &str,
    decode: impl Fn(&str, &Value) -> RemoteResult<T>,
) -> Vec<T> {
    children(docs, collection)
        .into_iter()
        .filter_map(|(id, doc)| match decode(id, doc) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping document {}/{}: {}", collection, id, e);
                None
            }
        })
        .collect()
}

fn check_owner(owner_id: &str) -> RemoteResult<()> {
    if owner_id.trim().is_empty() {
        return Err(RemoteError::NotAuthenticated);
    }
    Ok(())
}

impl DocumentStore {
    /// Creates an empty store that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            docs: Mutex::new(Documents::new()),
            snapshot_path: None,
        }
    }

    /// Opens a store persisted at `path`, starting empty if the file is absent.
    pub async fn open(path: impl Into<PathBuf>) -> RemoteResult<Self> {
        let path = path.into();
        let docs = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RemoteError::Decode(format!("snapshot {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::new(),
            Err(e) => {
                return Err(RemoteError::Unavailable(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            docs: Mutex::new(docs),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Number of stored documents of every kind.
    pub async fn document_count(&self) -> usize {
        self.docs.lock().await.len()
    }

    async fn persist(&self, docs: &Documents) -> RemoteResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
            }
        }

        let bytes = serde_json::to_vec_pretty(docs)
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| RemoteError::Unavailable(format!("writing {}: {}", path.display(), e)))
    }

    /// Applies `edit` to a copy of the documents and commits it only if both
    /// the edit and the snapshot write succeed.
    async fn write<T>(
        &self,
        edit: impl FnOnce(&mut Documents) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let mut docs = self.docs.lock().await;
        let mut next = docs.clone();
        let out = edit(&mut next)?;
        self.persist(&next).await?;
        *docs = next;
        Ok(out)
    }
}

#[async_trait]
impl RemoteStore for DocumentStore {
    async fn fetch_all_recipes(&self) -> RemoteResult<Vec<Recipe>> {
        let docs = self.docs.lock().await;
        let mut recipes = decode_children(&docs, "recipes", decode_recipe);
        recipes.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        tracing::debug!("Fetched {} recipe(s)", recipes.len());
        Ok(recipes)
    }

    async fn fetch_recipe_by_id(&self, id: &str) -> RemoteResult<Option<Recipe>> {
        let docs = self.docs.lock().await;
        docs.get(&recipe_path(id))
            .map(|doc| decode_recipe(id, doc))
            .transpose()
    }

    async fn add_recipe(&self, recipe: &Recipe) -> RemoteResult<String> {
        let id = new_id();
        let doc = encode_recipe(recipe);
        self.write(|docs| {
            docs.insert(recipe_path(&id), doc);
            Ok(())
        })
        .await?;
        tracing::debug!("Added recipe {} ({})", id, recipe.title);
        Ok(id)
    }

    async fn fetch_all_collections(&self, owner_id: &str) -> RemoteResult<Vec<RecipeCollection>> {
        check_owner(owner_id)?;
        let docs = self.docs.lock().await;
        let mut collections = decode_children(&docs, &collections_path(owner_id), |id, doc| {
            decode_collection(id, owner_id, doc)
        });
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(collections)
    }

    async fn fetch_collection(
        &self,
        owner_id: &str,
        collection_id: &str,
    ) -> RemoteResult<Option<RecipeCollection>> {
        check_owner(owner_id)?;
        let docs = self.docs.lock().await;
        let path = format!("{}/{}", collections_path(owner_id), collection_id);
        docs.get(&path)
            .map(|doc| decode_collection(collection_id, owner_id, doc))
            .transpose()
    }

    async fn create_collection(&self, owner_id: &str, name: &str) -> RemoteResult<String> {
        check_owner(owner_id)?;
        let id = new_id();
        let doc = encode_collection(&RecipeCollection::new(&id, name, owner_id));
        let path = format!("{}/{}", collections_path(owner_id), id);
        self.write(|docs| {
            docs.insert(path, doc);
            Ok(())
        })
        .await?;
        tracing::debug!("Created collection {} ({})", id, name);
        Ok(id)
    }

    async fn update_collection_recipe_ids(
        &self,
        owner_id: &str,
        collection_id: &str,
        recipe_ids: &[String],
    ) -> RemoteResult<()> {
        check_owner(owner_id)?;
        let path = format!("{}/{}", collections_path(owner_id), collection_id);
        self.write(|docs| {
            let doc = docs
                .get_mut(&path)
                .ok_or_else(|| RemoteError::NotFound(path.clone()))?;
            let obj = doc
                .as_object_mut()
                .ok_or_else(|| RemoteError::Decode(format!("{}: not an object", path)))?;
            obj.insert("recipeIds".to_string(), Value::from(recipe_ids.to_vec()));
            Ok(())
        })
        .await
    }

    async fn delete_collection(&self, owner_id: &str, collection_id: &str) -> RemoteResult<()> {
        check_owner(owner_id)?;
        let path = format!("{}/{}", collections_path(owner_id), collection_id);
        self.write(|docs| {
            docs.remove(&path);
            Ok(())
        })
        .await
    }

    async fn fetch_favorites(&self, owner_id: &str) -> RemoteResult<Vec<Recipe>> {
        check_owner(owner_id)?;
        let docs = self.docs.lock().await;
        let mut favorites = decode_children(&docs, &favorites_path(owner_id), decode_recipe);
        favorites.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(favorites
            .into_iter()
            .map(|r| r.with_favorite(true))
            .collect())
    }

    async fn set_favorite(
        &self,
        owner_id: &str,
        recipe: &Recipe,
        present: bool,
    ) -> RemoteResult<()> {
        check_owner(owner_id)?;
        let path = format!("{}/{}", favorites_path(owner_id), recipe.id);
        let doc = encode_recipe(recipe);
        self.write(|docs| {
            if present {
                docs.insert(path, doc);
            } else {
                docs.remove(&path);
            }
            Ok(())
        })
        .await
    }

    async fn fetch_reviews(&self, recipe_id: &str) -> RemoteResult<Vec<Review>> {
        let docs = self.docs.lock().await;
        let mut reviews = decode_children(&docs, &reviews_path(recipe_id), decode_review);
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn submit_review(&self, review: &Review) -> RemoteResult<Review> {
        check_owner(&review.author_id)?;
        let review_id = new_id();
        let stored = Review {
            id: review_id.clone(),
            ..review.clone()
        };
        let review_doc = encode_review(&stored);
        let path = recipe_path(&review.recipe_id);

        self.write(|docs| {
            let recipe_doc = docs
                .get(&path)
                .ok_or_else(|| RemoteError::NotFound(path.clone()))?;
            let recipe = decode_recipe(&review.recipe_id, recipe_doc)?;
            let stats = recipe.stats.with_rating(review.rating);

            docs.insert(path.clone(), encode_recipe(&recipe.with_stats(stats)));
            docs.insert(
                format!("{}/{}", reviews_path(&review.recipe_id), review_id),
                review_doc,
            );
            Ok(())
        })
        .await?;

        tracing::debug!("Stored review {} for recipe {}", stored.id, stored.recipe_id);
        Ok(stored)
    }

    async fn fetch_posts(
        &self,
        limit: usize,
        before: Option<DateTime<Utc>>,
    ) -> RemoteResult<Vec<CommunityPost>> {
        let docs = self.docs.lock().await;
        let mut posts = decode_children(&docs, "posts", decode_post);
        posts.retain(|p| before.map_or(true, |cutoff| p.created_at < cutoff));
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        posts.truncate(limit);
        Ok(posts)
    }

    async fn create_post(&self, post: &CommunityPost) -> RemoteResult<CommunityPost> {
        check_owner(&post.author_id)?;
        let doc = encode_post(post);
        // Read back through the decoder so timestamps match later fetches
        let stored = decode_post(&new_id(), &doc)?;
        self.write(|docs| {
            docs.insert(post_path(&stored.id), doc);
            Ok(())
        })
        .await?;
        tracing::debug!("Created post {} by {}", stored.id, stored.author_id);
        Ok(stored)
    }

    async fn liked_post_ids(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> RemoteResult<BTreeSet<String>> {
        check_owner(user_id)?;
        let docs = self.docs.lock().await;
        Ok(post_ids
            .iter()
            .filter(|id| docs.contains_key(&like_path(id, user_id)))
            .cloned()
            .collect())
    }

    async fn set_like(&self, post_id: &str, user_id: &str, liked: bool) -> RemoteResult<()> {
        check_owner(user_id)?;
        let changed = self
            .write(|docs| {
                let post = existing_post(docs, post_id)?;
                let path = like_path(post_id, user_id);
                if docs.contains_key(&path) == liked {
                    return Ok(false);
                }

                if liked {
                    let like = serde_json::json!({ "timestamp": Utc::now().timestamp_millis() });
                    docs.insert(path, like);
                } else {
                    docs.remove(&path);
                }
                docs.insert(post_path(post_id), encode_post(&post.with_like(liked)));
                Ok(true)
            })
            .await?;

        if changed {
            tracing::debug!("Like on post {} by {} set to {}", post_id, user_id, liked);
        }
        Ok(())
    }

    async fn fetch_comments(&self, post_id: &str) -> RemoteResult<Vec<PostComment>> {
        let docs = self.docs.lock().await;
        let mut comments = decode_children(&docs, &comments_path(post_id), |id, doc| {
            decode_comment(id, post_id, doc)
        });
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    async fn add_comment(&self, comment: &PostComment) -> RemoteResult<PostComment> {
        check_owner(&comment.author_id)?;
        let stored = PostComment {
            id: new_id(),
            ..comment.clone()
        };
        let comment_doc = encode_comment(&stored);

        self.write(|docs| {
            let mut post = existing_post(docs, &stored.post_id)?;
            post.comment_count = post.comment_count.saturating_add(1);

            docs.insert(post_path(&stored.post_id), encode_post(&post));
            docs.insert(
                format!("{}/{}", comments_path(&stored.post_id), stored.id),
                comment_doc,
            );
            Ok(())
        })
        .await?;

        tracing::debug!("Stored comment {} on post {}", stored.id, stored.post_id);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seeded() -> (DocumentStore, String) {
        let store = DocumentStore::in_memory();
        let id = store
            .add_recipe(&Recipe::new("Brownies", "chef"))
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_add_and_fetch_recipes_sorted_by_title() {
        let store = DocumentStore::in_memory();
        store.add_recipe(&Recipe::new("Zucchini Bread", "chef")).await.unwrap();
        store.add_recipe(&Recipe::new("Apple Pie", "chef")).await.unwrap();

        let titles: Vec<String> = store
            .fetch_all_recipes()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Apple Pie", "Zucchini Bread"]);
    }

    #[tokio::test]
    async fn test_reviews_are_not_listed_as_recipes() {
        let (store, id) = seeded().await;
        store
            .submit_review(&Review::new(&id, "u1", "Sam", 4.0, "Nice"))
            .await
            .unwrap();

        assert_eq!(store.fetch_all_recipes().await.unwrap().len(), 1);
        assert_eq!(store.fetch_reviews(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_review_updates_running_mean() {
        let store = DocumentStore::in_memory();
        let recipe = Recipe::new("Stew", "chef").with_stats(crate::models::ReviewStats {
            review_count: 2,
            average_rating: 3.0,
        });
        let id = store.add_recipe(&recipe).await.unwrap();

        let stored = store
            .submit_review(&Review::new(&id, "u1", "Sam", 4.0, ""))
            .await
            .unwrap();
        assert!(!stored.id.is_empty());

        let updated = store.fetch_recipe_by_id(&id).await.unwrap().unwrap();
        assert_eq!(updated.stats.review_count, 3);
        assert!((updated.stats.average_rating - 10.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_submit_review_for_missing_recipe_writes_nothing() {
        let store = DocumentStore::in_memory();
        let err = store
            .submit_review(&Review::new("missing", "u1", "Sam", 4.0, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let store = DocumentStore::in_memory();
        let id = store.create_collection("u1", "Desserts").await.unwrap();

        store
            .update_collection_recipe_ids("u1", &id, &["r1".to_string()])
            .await
            .unwrap();

        let fetched = store.fetch_collection("u1", &id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Desserts");
        assert_eq!(fetched.recipe_ids, vec!["r1"]);
        assert_eq!(fetched.owner_id, "u1");

        // Other users do not see it
        assert!(store.fetch_all_collections("u2").await.unwrap().is_empty());

        store.delete_collection("u1", &id).await.unwrap();
        store.delete_collection("u1", &id).await.unwrap();
        assert!(store.fetch_collection("u1", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_collection_is_not_found() {
        let store = DocumentStore::in_memory();
        let err = store
            .update_collection_recipe_ids("u1", "nope", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_owner_required() {
        let store = DocumentStore::in_memory();
        assert_eq!(
            store.fetch_favorites("").await.unwrap_err(),
            RemoteError::NotAuthenticated
        );
        assert_eq!(
            store.create_collection(" ", "x").await.unwrap_err(),
            RemoteError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_favorites_set_and_clear() {
        let (store, id) = seeded().await;
        let recipe = store.fetch_recipe_by_id(&id).await.unwrap().unwrap();

        store.set_favorite("u1", &recipe, true).await.unwrap();
        let favorites = store.fetch_favorites("u1").await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, id);
        assert!(favorites[0].is_favorite);

        store.set_favorite("u1", &recipe, false).await.unwrap();
        assert!(store.fetch_favorites("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let (store, _id) = seeded().await;
        store
            .write(|docs| {
                docs.insert("recipes/bad".into(), serde_json::json!({ "servings": "many" }));
                Ok(())
            })
            .await
            .unwrap();

        let recipes = store.fetch_all_recipes().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert!(store.fetch_recipe_by_id("bad").await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_persists_across_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("remote").join("store.json");

        {
            let store = DocumentStore::open(&path).await.unwrap();
            store.add_recipe(&Recipe::new("Kept", "chef")).await.unwrap();
        }

        let store = DocumentStore::open(&path).await.unwrap();
        let recipes = store.fetch_all_recipes().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].title, "Kept");
    }

    async fn post_at(store: &DocumentStore, caption: &str, minutes_ago: i64) -> CommunityPost {
        let post = CommunityPost::new("u1", "Sam", "https://img/p.jpg", caption)
            .with_created_at(Utc::now() - chrono::Duration::minutes(minutes_ago));
        store.create_post(&post).await.unwrap()
    }

    #[tokio::test]
    async fn test_posts_newest_first_with_paging() {
        let store = DocumentStore::in_memory();
        post_at(&store, "oldest", 30).await;
        post_at(&store, "middle", 20).await;
        post_at(&store, "newest", 10).await;

        let first = store.fetch_posts(2, None).await.unwrap();
        let captions: Vec<&str> = first.iter().map(|p| p.caption.as_str()).collect();
        assert_eq!(captions, vec!["newest", "middle"]);

        let cursor = first.last().map(|p| p.created_at);
        let more = store.fetch_posts(10, cursor).await.unwrap();
        assert_eq!(more.len(), 1);
        assert_eq!(more[0].caption, "oldest");
    }

    #[tokio::test]
    async fn test_likes_and_comments_are_not_listed_as_posts() {
        let store = DocumentStore::in_memory();
        let post = post_at(&store, "Roast", 0).await;
        store.set_like(&post.id, "u2", true).await.unwrap();
        store
            .add_comment(&PostComment::new(&post.id, "u2", "Alex", "Yum"))
            .await
            .unwrap();

        assert_eq!(store.fetch_posts(20, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_like_moves_count_once() {
        let store = DocumentStore::in_memory();
        let post = post_at(&store, "Roast", 0).await;

        store.set_like(&post.id, "u2", true).await.unwrap();
        store.set_like(&post.id, "u2", true).await.unwrap();
        store.set_like(&post.id, "u3", true).await.unwrap();

        let fetched = &store.fetch_posts(1, None).await.unwrap()[0];
        assert_eq!(fetched.like_count, 2);
        let liked = store
            .liked_post_ids("u2", &[post.id.clone(), "other".into()])
            .await
            .unwrap();
        assert_eq!(liked.into_iter().collect::<Vec<_>>(), vec![post.id.clone()]);

        store.set_like(&post.id, "u2", false).await.unwrap();
        store.set_like(&post.id, "u2", false).await.unwrap();
        assert_eq!(store.fetch_posts(1, None).await.unwrap()[0].like_count, 1);
    }

    #[tokio::test]
    async fn test_like_on_missing_post_writes_nothing() {
        let store = DocumentStore::in_memory();
        let err = store.set_like("missing", "u2", true).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_comment_increments_count() {
        let store = DocumentStore::in_memory();
        let post = post_at(&store, "Roast", 0).await;

        let first = store
            .add_comment(&PostComment::new(&post.id, "u2", "Alex", "First"))
            .await
            .unwrap();
        store
            .add_comment(&PostComment::new(&post.id, "u3", "Kim", "Second"))
            .await
            .unwrap();
        assert!(!first.id.is_empty());

        let comments = store.fetch_comments(&post.id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second"]);
        assert_eq!(store.fetch_posts(1, None).await.unwrap()[0].comment_count, 2);

        let err = store
            .add_comment(&PostComment::new("missing", "u2", "Alex", "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }
}
