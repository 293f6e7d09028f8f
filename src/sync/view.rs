//! Observable state exposed to the front end.
//!
//! The coordinator is the only writer. Observers hold a
//! [`tokio::sync::watch::Receiver`] and read the latest [`ViewState`].

use std::collections::BTreeSet;
use tokio::sync::watch;

use crate::models::{CommunityPost, PostComment, Recipe, RecipeCollection, Review};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub recipes: Vec<Recipe>,
    pub collections: Vec<RecipeCollection>,
    pub downloaded_ids: BTreeSet<String>,
    pub reviews: Vec<Review>,
    /// Community feed, newest first.
    pub posts: Vec<CommunityPost>,
    /// Posts among `posts` the signed-in user has liked.
    pub liked_post_ids: BTreeSet<String>,
    pub comments: Vec<PostComment>,
    /// Post whose thread `comments` holds.
    pub comments_post_id: Option<String>,
    pub is_loading: bool,
    pub reviews_loading: bool,
    pub feed_loading: bool,
    pub comments_loading: bool,
    pub error: Option<String>,
}

impl ViewState {
    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn collection(&self, id: &str) -> Option<&RecipeCollection> {
        self.collections.iter().find(|c| c.id == id)
    }

    pub fn is_downloaded(&self, id: &str) -> bool {
        self.downloaded_ids.contains(id)
    }

    pub fn post(&self, id: &str) -> Option<&CommunityPost> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked_post_ids.contains(post_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Loading {
    All,
    Reviews,
    Feed,
    Comments,
}

impl Loading {
    fn flag(self, state: &mut ViewState) -> &mut bool {
        match self {
            Loading::All => &mut state.is_loading,
            Loading::Reviews => &mut state.reviews_loading,
            Loading::Feed => &mut state.feed_loading,
            Loading::Comments => &mut state.comments_loading,
        }
    }
}

/// Holds a loading flag up for as long as it lives.
pub(crate) struct LoadingGuard<'a> {
    view: &'a watch::Sender<ViewState>,
    kind: Loading,
}

impl<'a> LoadingGuard<'a> {
    pub(crate) fn start(view: &'a watch::Sender<ViewState>, kind: Loading) -> Self {
        view.send_modify(|state| *kind.flag(state) = true);
        Self { view, kind }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let kind = self.kind;
        self.view.send_modify(|state| *kind.flag(state) = false);
    }
}

type Rollback<'a> = Box<dyn FnOnce(&mut ViewState) + Send + 'a>;

/// An applied optimistic view change.
///
/// Dropping it without [`Optimistic::confirm`] runs the rollback, so every
/// exit path ends either confirmed or rolled back.
pub(crate) struct Optimistic<'a> {
    view: &'a watch::Sender<ViewState>,
    rollback: Option<Rollback<'a>>,
    label: String,
}

impl<'a> Optimistic<'a> {
    pub(crate) fn apply(
        view: &'a watch::Sender<ViewState>,
        label: impl Into<String>,
        apply: impl FnOnce(&mut ViewState),
        rollback: impl FnOnce(&mut ViewState) + Send + 'a,
    ) -> Self {
        view.send_modify(apply);
        Self {
            view,
            rollback: Some(Box::new(rollback)),
            label: label.into(),
        }
    }

    pub(crate) fn confirm(mut self) {
        self.rollback = None;
        tracing::debug!("Confirmed {}", self.label);
    }
}

impl Drop for Optimistic<'_> {
    fn drop(&mut self) {
        if let Some(rollback) = self.rollback.take() {
            tracing::warn!("Rolling back {}", self.label);
            self.view.send_modify(rollback);
        }
    }
}
