//! Refreshes the local cache and reports how it went.

use clap::{Args, Subcommand};

use super::App;
use crate::config::Config;
use culinary::sync::{SyncError, SyncSlice};

/// Refresh the local cache from the backend
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show backend settings and what the cache holds
    Status,
}

impl SyncCommand {
    pub async fn run(&self, app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(app).await,
            Some(SyncSubcommand::Status) => self.status(app, config).await,
        }
    }

    async fn sync(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        println!("Syncing...");
        println!();

        let failed = match app.coordinator.load_all().await {
            Ok(()) => Vec::new(),
            Err(e @ SyncError::PartialSync(_)) => {
                eprintln!("Warning: {}", e);
                e.failed_slices()
            }
            Err(e) => return Err(e.into()),
        };

        let view = app.coordinator.view();
        let favorites = view.recipes.iter().filter(|r| r.is_favorite).count();
        let rows = [
            ("recipes", view.recipes.len(), SyncSlice::Recipes),
            ("favorites", favorites, SyncSlice::Favorites),
            ("collections", view.collections.len(), SyncSlice::Collections),
            ("downloaded", view.downloaded_ids.len(), SyncSlice::Downloads),
        ];
        for (name, count, slice) in rows {
            let status = if failed.contains(&slice) {
                "✗ kept previous"
            } else {
                "✓"
            };
            println!("  {} {} ({})", status, name, count);
        }

        println!();
        if failed.is_empty() {
            println!("Sync complete.");
        } else {
            println!("Sync finished with errors.");
        }
        Ok(())
    }

    async fn status(&self, app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        println!("Backend store: {}", config.remote.store_path.value.display());
        println!("Local cache:   {}", config.database_path.value.display());
        match &config.user.uid {
            Some(uid) if config.user.is_signed_in() => println!("Signed in as:  {}", uid),
            _ => println!("Signed in as:  (nobody)"),
        }
        if config.remote.offline.value {
            println!("Mode:          offline (forced)");
        } else if let Some(url) = &config.remote.probe_url {
            println!("Probe URL:     {}", url);
        }
        println!();

        let cache = app.coordinator.cache();
        let favorites = cache.recipes().favorite_ids().await?;
        let downloaded = cache.recipes().downloaded_ids().await?;
        let collections = cache.collections().list().await?;
        println!("Cached favorites:   {}", favorites.len());
        println!("Cached downloads:   {}", downloaded.len());
        println!("Cached collections: {}", collections.len());

        Ok(())
    }
}
