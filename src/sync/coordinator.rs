//! Orchestrates reads and writes between the backend and the local cache.
//!
//! Every public operation records its failure in [`ViewState::error`]
//! before returning it, so observers always see why something went wrong.
//!
//! A full load runs exclusively: mutations of favorites, downloads,
//! collections and recipes share the reload gate, so a load never writes
//! back data it fetched before a concurrent mutation landed. The community
//! feed has a gate of its own, shared the same way by likes and comments.

mod feed;

pub use feed::{FEED_MORE_PAGE_SIZE, FEED_PAGE_SIZE};

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use super::connectivity::Connectivity;
use super::error::{SliceFailure, SyncError, SyncSlice};
use super::locks::EntityLocks;
use super::merge::{self, MembershipEdit};
use super::view::{Loading, LoadingGuard, Optimistic, ViewState};
use crate::db::{CacheFlag, CachedRecipe, LocalCache};
use crate::models::{Recipe, RecipeCollection, Review, UserProfile};
use crate::remote::{AuthProvider, RemoteError, RemoteStore};

pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
    cache: LocalCache,
    auth: Arc<dyn AuthProvider>,
    connectivity: Arc<dyn Connectivity>,
    view: watch::Sender<ViewState>,
    locks: EntityLocks,
    reload: RwLock<()>,
    feed_reload: RwLock<()>,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: LocalCache,
        auth: Arc<dyn AuthProvider>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        let (view, _) = watch::channel(ViewState::default());
        Self {
            remote,
            cache,
            auth,
            connectivity,
            view,
            locks: EntityLocks::new(),
            reload: RwLock::new(()),
            feed_reload: RwLock::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Favorite-filtered subset of the current recipes.
    pub fn favorites(&self) -> Vec<Recipe> {
        self.view
            .borrow()
            .recipes
            .iter()
            .filter(|r| r.is_favorite)
            .cloned()
            .collect()
    }

    /// Collections in the current view that contain `recipe_id`.
    pub fn collections_containing(&self, recipe_id: &str) -> Vec<RecipeCollection> {
        self.view
            .borrow()
            .collections
            .iter()
            .filter(|c| c.contains_recipe(recipe_id))
            .cloned()
            .collect()
    }

    /// Refreshes the whole view, from the backend when online and from the
    /// local cache otherwise.
    ///
    /// Online, recipes, favorites and collections are fetched concurrently.
    /// A failed slice keeps its previous value and is reported in a
    /// [`SyncError::PartialSync`]; the other slices are still applied.
    pub async fn load_all(&self) -> Result<(), SyncError> {
        let _loading = LoadingGuard::start(&self.view, Loading::All);
        let _exclusive = self.reload.write().await;
        self.view.send_modify(|state| state.error = None);

        let result = if self.connectivity.is_online().await {
            self.load_online().await
        } else {
            self.load_offline().await
        };
        self.record(result)
    }

    pub async fn toggle_favorite(&self, recipe: &Recipe, desired: bool) -> Result<(), SyncError> {
        let result = self.set_favorite(recipe, desired).await;
        self.record(result)
    }

    /// Flips whether `recipe` is kept for offline reading. Returns the new
    /// state.
    pub async fn toggle_download(&self, recipe: &Recipe) -> Result<bool, SyncError> {
        let result = self.flip_download(recipe).await;
        self.record(result)
    }

    /// Creates a collection and returns its id.
    pub async fn create_collection(&self, name: &str) -> Result<String, SyncError> {
        let result = self.new_collection(name).await;
        self.record(result)
    }

    /// Returns whether the collection changed.
    pub async fn add_to_collection(
        &self,
        recipe_id: &str,
        collection_id: &str,
    ) -> Result<bool, SyncError> {
        let result = self
            .edit_collection(collection_id, recipe_id, MembershipEdit::Add)
            .await;
        self.record(result)
    }

    /// Returns whether the collection changed.
    pub async fn remove_from_collection(
        &self,
        recipe_id: &str,
        collection_id: &str,
    ) -> Result<bool, SyncError> {
        let result = self
            .edit_collection(collection_id, recipe_id, MembershipEdit::Remove)
            .await;
        self.record(result)
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<(), SyncError> {
        let result = self.remove_collection(collection_id).await;
        self.record(result)
    }

    /// Makes the local favorite cache match the backend and refreshes the
    /// view's flags. Returns the number of favorites.
    pub async fn sync_local_favorites(&self) -> Result<usize, SyncError> {
        let result = self.reconcile_favorites().await;
        self.record(result)
    }

    /// Publishes a new recipe authored by the signed-in user. Returns its id.
    pub async fn create_recipe(&self, draft: Recipe) -> Result<String, SyncError> {
        let result = self.publish_recipe(draft).await;
        self.record(result)
    }

    /// Loads the reviews of a recipe into the view, newest first.
    pub async fn load_reviews(&self, recipe_id: &str) -> Result<Vec<Review>, SyncError> {
        let _loading = LoadingGuard::start(&self.view, Loading::Reviews);
        let result = self.remote.fetch_reviews(recipe_id).await;

        let reviews = result.as_ref().map(Vec::clone).unwrap_or_default();
        self.view.send_modify(|state| state.reviews = reviews);

        self.record(result.map_err(SyncError::from))
    }

    pub async fn submit_review(
        &self,
        recipe_id: &str,
        rating: f32,
        text: &str,
    ) -> Result<Review, SyncError> {
        let result = self.post_review(recipe_id, rating, text).await;
        self.record(result)
    }

    fn record<T>(&self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(e) = &result {
            self.report(e.to_string());
        }
        result
    }

    /// Publishes a failure that does not fail the current operation.
    fn report(&self, message: String) {
        tracing::warn!("{}", message);
        self.view.send_modify(|state| state.error = Some(message));
    }

    fn require_user(&self) -> Result<UserProfile, SyncError> {
        self.auth.current_user().ok_or(SyncError::NotAuthenticated)
    }

    async fn load_offline(&self) -> Result<(), SyncError> {
        let recipes: Vec<Recipe> = self
            .cache
            .recipes()
            .list()
            .await?
            .into_iter()
            .map(CachedRecipe::into_recipe)
            .collect();
        let collections = self.cache.collections().list().await?;
        let downloaded_ids = self.cache.recipes().downloaded_ids().await?;

        tracing::info!(
            "Loaded {} cached recipe(s) and {} collection(s) offline",
            recipes.len(),
            collections.len()
        );

        self.view.send_modify(|state| {
            state.recipes = recipes;
            state.collections = collections;
            state.downloaded_ids = downloaded_ids;
        });
        Ok(())
    }

    async fn load_online(&self) -> Result<(), SyncError> {
        let owner = self.auth.current_user().map(|u| u.uid);
        let owner = owner.as_deref();

        // Only the backend calls overlap; cache writes below run one at a time
        let (recipes, favorites, collections) = futures::join!(
            self.remote.fetch_all_recipes(),
            self.remote_favorites(owner),
            self.remote_collections(owner),
        );

        let mut failures = Vec::new();
        let mut note = |slice: SyncSlice, e: &dyn std::fmt::Display| {
            tracing::warn!("Failed to load {}: {}", slice, e);
            failures.push(SliceFailure {
                slice,
                reason: e.to_string(),
            });
        };

        let recipes = recipes.map_err(|e| note(SyncSlice::Recipes, &e)).ok();
        let favorites = favorites.map_err(|e| note(SyncSlice::Favorites, &e)).ok();
        let collections = collections
            .map_err(|e| note(SyncSlice::Collections, &e))
            .ok();

        if let Some(favorites) = &favorites {
            if let Err(e) = self.cache.recipes().reconcile_favorites(favorites).await {
                note(SyncSlice::Favorites, &SyncError::from(e));
            }
        }
        if let Some(collections) = &collections {
            if let Err(e) = self.cache.collections().replace_all(collections).await {
                note(SyncSlice::Collections, &SyncError::from(e));
            }
        }

        let favorite_ids: Option<BTreeSet<String>> =
            favorites.map(|favs| favs.into_iter().map(|r| r.id).collect::<BTreeSet<_>>());
        let cached_favorites = match &favorite_ids {
            Some(_) => BTreeSet::new(),
            None => match self.cache.recipes().favorite_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    note(SyncSlice::Favorites, &SyncError::from(e));
                    BTreeSet::new()
                }
            },
        };
        let downloaded_ids = match self.cache.recipes().downloaded_ids().await {
            Ok(ids) => Some(ids),
            Err(e) => {
                note(SyncSlice::Downloads, &SyncError::from(e));
                None
            }
        };

        tracing::info!(
            "Loaded {} recipe(s), {} favorite(s), {} collection(s)",
            recipes.as_ref().map_or(0, Vec::len),
            favorite_ids.as_ref().map_or(0, BTreeSet::len),
            collections.as_ref().map_or(0, Vec::len)
        );

        self.view.send_modify(|state| {
            match (recipes, &favorite_ids) {
                (Some(recipes), Some(favs)) => {
                    state.recipes = merge::apply_favorites(recipes, favs);
                }
                (Some(recipes), None) => {
                    let favs =
                        merge::fallback_favorites(&recipes, &state.recipes, &cached_favorites);
                    state.recipes = merge::apply_favorites(recipes, &favs);
                }
                (None, Some(favs)) => {
                    let previous = std::mem::take(&mut state.recipes);
                    state.recipes = merge::apply_favorites(previous, favs);
                }
                (None, None) => {}
            }
            if let Some(collections) = collections {
                state.collections = collections;
            }
            if let Some(ids) = downloaded_ids {
                state.downloaded_ids = ids;
            }
        });

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::PartialSync(failures))
        }
    }

    async fn remote_favorites(&self, owner: Option<&str>) -> Result<Vec<Recipe>, SyncError> {
        let owner = owner.ok_or(SyncError::NotAuthenticated)?;
        Ok(self.remote.fetch_favorites(owner).await?)
    }

    async fn remote_collections(
        &self,
        owner: Option<&str>,
    ) -> Result<Vec<RecipeCollection>, SyncError> {
        let owner = owner.ok_or(SyncError::NotAuthenticated)?;
        Ok(self.remote.fetch_all_collections(owner).await?)
    }

    /// Remote favorites, after reconciling the local favorite cache to them.
    async fn fetch_favorites(&self, owner: &str) -> Result<Vec<Recipe>, SyncError> {
        let favorites = self.remote_favorites(Some(owner)).await?;
        self.cache.recipes().reconcile_favorites(&favorites).await?;
        Ok(favorites)
    }

    /// Remote collections, after replacing the local copies with them.
    async fn fetch_collections(&self, owner: &str) -> Result<Vec<RecipeCollection>, SyncError> {
        let collections = self.remote_collections(Some(owner)).await?;
        self.cache.collections().replace_all(&collections).await?;
        Ok(collections)
    }

    /// Re-derives the collections view from the backend after a mutation.
    /// A failure here is recorded but does not fail the mutation.
    async fn refresh_collections(&self, owner: &str) {
        match self.fetch_collections(owner).await {
            Ok(collections) => self.view.send_modify(|state| state.collections = collections),
            Err(e) => self.report(format!("Failed to reload collections: {}", e)),
        }
    }

    async fn set_favorite(&self, recipe: &Recipe, desired: bool) -> Result<(), SyncError> {
        let _shared = self.reload.read().await;
        let _lock = self.locks.lock_recipe(&recipe.id).await;
        let owner = self.require_user()?;

        let previous = self.view.borrow().recipe(&recipe.id).map(|r| r.is_favorite);
        let restore = previous.unwrap_or(!desired);
        let id = recipe.id.clone();

        let update = Optimistic::apply(
            &self.view,
            format!("favorite {} -> {}", recipe.id, desired),
            |state| {
                merge::set_favorite_flag(&mut state.recipes, &recipe.id, desired);
            },
            move |state| {
                merge::set_favorite_flag(&mut state.recipes, &id, restore);
            },
        );

        self.remote.set_favorite(&owner.uid, recipe, desired).await?;

        let local = if desired {
            self.cache.recipes().mark(recipe, CacheFlag::Favorite).await
        } else {
            self.cache
                .recipes()
                .unmark(&recipe.id, CacheFlag::Favorite)
                .await
        };

        if let Err(e) = local {
            if let Err(undo) = self.remote.set_favorite(&owner.uid, recipe, restore).await {
                tracing::error!(
                    "Favorite {} is now out of sync with the backend: {}",
                    recipe.id,
                    undo
                );
            }
            return Err(e.into());
        }

        update.confirm();
        tracing::debug!("Favorite {} set to {}", recipe.id, desired);
        Ok(())
    }

    async fn flip_download(&self, recipe: &Recipe) -> Result<bool, SyncError> {
        let _shared = self.reload.read().await;
        let _lock = self.locks.lock_recipe(&recipe.id).await;

        let desired = !self.view.borrow().is_downloaded(&recipe.id);
        let id = recipe.id.clone();
        let apply_id = recipe.id.clone();

        let update = Optimistic::apply(
            &self.view,
            format!("download {} -> {}", recipe.id, desired),
            move |state| {
                if desired {
                    state.downloaded_ids.insert(apply_id);
                } else {
                    state.downloaded_ids.remove(&apply_id);
                }
            },
            move |state| {
                if desired {
                    state.downloaded_ids.remove(&id);
                } else {
                    state.downloaded_ids.insert(id);
                }
            },
        );

        if desired {
            self.cache.recipes().mark(recipe, CacheFlag::Downloaded).await?;
        } else {
            self.cache
                .recipes()
                .unmark(&recipe.id, CacheFlag::Downloaded)
                .await?;
        }

        update.confirm();
        Ok(desired)
    }

    async fn new_collection(&self, name: &str) -> Result<String, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::InvalidInput(
                "collection name must not be blank".to_string(),
            ));
        }
        let owner = self.require_user()?;
        let _shared = self.reload.read().await;

        let id = self.remote.create_collection(&owner.uid, name).await?;
        tracing::info!("Created collection '{}' ({})", name, id);

        let mirror = RecipeCollection::new(&id, name, &owner.uid);
        if let Err(e) = self.cache.collections().upsert(&mirror).await {
            self.report(format!("Failed to mirror collection {} locally: {}", id, e));
        }

        self.refresh_collections(&owner.uid).await;
        Ok(id)
    }

    /// Current state of a collection, preferring the backend.
    async fn read_collection(
        &self,
        owner: &str,
        collection_id: &str,
    ) -> Result<RecipeCollection, SyncError> {
        let not_found = || SyncError::NotFound(format!("collection {}", collection_id));

        match self.remote.fetch_collection(owner, collection_id).await {
            Ok(Some(collection)) => Ok(collection),
            Ok(None) => Err(not_found()),
            Err(RemoteError::Unavailable(reason)) => {
                tracing::warn!(
                    "Backend unavailable ({}), reading collection {} from cache",
                    reason,
                    collection_id
                );
                self.cache
                    .collections()
                    .get(collection_id)
                    .await?
                    .ok_or_else(not_found)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn edit_collection(
        &self,
        collection_id: &str,
        recipe_id: &str,
        edit: MembershipEdit,
    ) -> Result<bool, SyncError> {
        let owner = self.require_user()?;
        let _shared = self.reload.read().await;
        let _lock = self.locks.lock_collection(collection_id).await;

        let current = self.read_collection(&owner.uid, collection_id).await?;
        let Some(updated) = merge::edit_membership(&current, recipe_id, edit) else {
            tracing::debug!(
                "{:?} {} on collection {} changes nothing",
                edit,
                recipe_id,
                collection_id
            );
            return Ok(false);
        };

        self.remote
            .update_collection_recipe_ids(&owner.uid, collection_id, &updated.recipe_ids)
            .await?;
        self.cache.collections().upsert(&updated).await?;

        self.refresh_collections(&owner.uid).await;
        Ok(true)
    }

    async fn remove_collection(&self, collection_id: &str) -> Result<(), SyncError> {
        let owner = self.require_user()?;
        let _shared = self.reload.read().await;
        let _lock = self.locks.lock_collection(collection_id).await;

        self.remote
            .delete_collection(&owner.uid, collection_id)
            .await?;
        self.cache.collections().delete(collection_id).await?;
        tracing::info!("Deleted collection {}", collection_id);

        self.refresh_collections(&owner.uid).await;
        Ok(())
    }

    async fn reconcile_favorites(&self) -> Result<usize, SyncError> {
        let owner = self.require_user()?;
        let _exclusive = self.reload.write().await;
        let favorites = self.fetch_favorites(&owner.uid).await?;
        let ids: BTreeSet<String> = favorites.into_iter().map(|r| r.id).collect();

        tracing::info!("Reconciled {} favorite(s)", ids.len());
        let count = ids.len();
        self.view.send_modify(|state| {
            let recipes = std::mem::take(&mut state.recipes);
            state.recipes = merge::apply_favorites(recipes, &ids);
        });
        Ok(count)
    }

    async fn publish_recipe(&self, draft: Recipe) -> Result<String, SyncError> {
        let owner = self.require_user()?;
        let _shared = self.reload.read().await;
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(SyncError::InvalidInput(
                "recipe title must not be blank".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        let recipe = Recipe {
            id: String::new(),
            title,
            ingredients: merge::clean_lines(&draft.ingredients),
            instructions: merge::clean_lines(&draft.instructions),
            dietary_tags: merge::clean_lines(&draft.dietary_tags),
            author: owner.author_name().to_string(),
            created_at: now,
            updated_at: now,
            stats: Default::default(),
            is_favorite: false,
            ..draft
        };

        let id = self.remote.add_recipe(&recipe).await?;
        tracing::info!("Published recipe '{}' ({})", recipe.title, id);

        let stored = recipe.with_id(&id);
        self.view.send_modify(|state| {
            state.recipes.retain(|r| r.id != stored.id);
            state.recipes.insert(0, stored);
        });
        Ok(id)
    }

    async fn post_review(
        &self,
        recipe_id: &str,
        rating: f32,
        text: &str,
    ) -> Result<Review, SyncError> {
        if !Review::is_valid_rating(rating) {
            return Err(SyncError::InvalidInput(format!(
                "rating {} is outside {}..={}",
                rating,
                crate::models::MIN_RATING,
                crate::models::MAX_RATING
            )));
        }
        let owner = self.require_user()?;
        let _shared = self.reload.read().await;
        let _lock = self.locks.lock_recipe(recipe_id).await;

        let draft = Review::new(recipe_id, &owner.uid, owner.author_name(), rating, text.trim());
        let stored = self.remote.submit_review(&draft).await?;

        let refreshed = match self.remote.fetch_recipe_by_id(recipe_id).await {
            Ok(recipe) => recipe,
            Err(e) => {
                tracing::warn!("Failed to refetch recipe {} after review: {}", recipe_id, e);
                None
            }
        };

        let updated = {
            let state = self.view.borrow();
            match (refreshed, state.recipe(recipe_id)) {
                (Some(fresh), Some(current)) => Some(fresh.with_favorite(current.is_favorite)),
                (Some(fresh), None) => Some(fresh),
                (None, Some(current)) => {
                    let stats = current.stats.with_rating(rating);
                    Some(current.clone().with_stats(stats))
                }
                (None, None) => None,
            }
        };

        if let Some(updated) = &updated {
            self.refresh_cached_snapshot(updated).await;
        }

        let review = stored.clone();
        self.view.send_modify(|state| {
            if let Some(updated) = updated {
                merge::replace_recipe(&mut state.recipes, updated);
            }
            state.reviews.insert(0, review);
        });
        Ok(stored)
    }

    /// Rewrites a cached snapshot with fresher data, keeping its flags.
    async fn refresh_cached_snapshot(&self, recipe: &Recipe) {
        let result = match self.cache.recipes().get(&recipe.id).await {
            Ok(Some(cached)) => {
                let fresh = CachedRecipe::new(recipe.clone(), cached.is_favorite, cached.is_downloaded);
                self.cache.recipes().upsert(&fresh).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.report(format!("Failed to refresh cached recipe {}: {}", recipe.id, e));
        }
    }
}
