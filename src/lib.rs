//! Culinary
//!
//! Recipes, favorites, collections, reviews and a community feed over a
//! document backend, with an on-device cache that keeps recipes available
//! offline.

pub mod db;
pub mod models;
pub mod remote;
pub mod sync;

pub use db::{CacheError, LocalCache};
pub use models::{
    CommunityPost, PostComment, Recipe, RecipeCategory, RecipeCollection, Review, ReviewStats,
    UserProfile,
};
pub use remote::{AuthProvider, DocumentStore, RemoteError, RemoteStore, StaticAuth};
pub use sync::{Connectivity, FixedConnectivity, HttpProbe, SyncCoordinator, SyncError, ViewState};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
