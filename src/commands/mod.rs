mod collection;
mod config_cmd;
mod feed;
mod recipe;
mod review;
mod sync_cmd;

pub use collection::CollectionCommand;
pub use config_cmd::ConfigCommand;
pub use feed::FeedCommand;
pub use recipe::RecipeCommand;
pub use review::ReviewCommand;
pub use sync_cmd::SyncCommand;

use clap::ValueEnum;
use std::error::Error;
use std::sync::Arc;

use crate::config::Config;
use culinary::remote::{AuthProvider, DocumentStore, StaticAuth};
use culinary::sync::{Connectivity, FixedConnectivity, HttpProbe, SyncCoordinator, SyncError};
use culinary::{LocalCache, Recipe, UserProfile};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything a command needs, built from the configuration.
pub struct App {
    pub coordinator: SyncCoordinator,
    pub remote: Arc<DocumentStore>,
}

pub async fn connect(config: &Config) -> Result<App, Box<dyn Error>> {
    let cache = LocalCache::open(&config.database_path.value).await?;
    let remote = Arc::new(DocumentStore::open(config.remote.store_path.value.clone()).await?);

    let auth: Arc<dyn AuthProvider> = match &config.user.uid {
        Some(uid) if config.user.is_signed_in() => {
            let mut user = UserProfile::new(uid.trim());
            if let Some(name) = &config.user.display_name {
                user = user.with_display_name(name);
            }
            Arc::new(StaticAuth::signed_in(user))
        }
        _ => Arc::new(StaticAuth::signed_out()),
    };

    let connectivity: Arc<dyn Connectivity> = if config.remote.offline.value {
        Arc::new(FixedConnectivity::offline())
    } else if let Some(url) = &config.remote.probe_url {
        Arc::new(HttpProbe::new(url.as_str())?)
    } else {
        Arc::new(FixedConnectivity::online())
    };

    let coordinator = SyncCoordinator::new(remote.clone(), cache, auth, connectivity);
    Ok(App {
        coordinator,
        remote,
    })
}

/// Loads the view, printing a warning instead of failing when only some
/// parts could be refreshed.
pub async fn load(app: &App) -> Result<(), SyncError> {
    match app.coordinator.load_all().await {
        Err(e @ SyncError::PartialSync(_)) => {
            eprintln!("Warning: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Finds a recipe in the loaded view.
pub fn find_recipe(app: &App, id: &str) -> Result<Recipe, SyncError> {
    app.coordinator
        .view()
        .recipe(id)
        .cloned()
        .ok_or_else(|| SyncError::NotFound(format!("recipe {}", id)))
}
