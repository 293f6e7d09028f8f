use clap::{Args, Subcommand};

use super::{load, App, OutputFormat};
use culinary::SyncError;

#[derive(Args)]
pub struct CollectionCommand {
    #[command(subcommand)]
    pub command: CollectionSubcommand,
}

#[derive(Subcommand)]
pub enum CollectionSubcommand {
    /// List collections
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the recipes in a collection
    Show {
        /// Collection ID
        id: String,
    },

    /// Create a new collection
    Create {
        /// Name of the collection
        name: String,
    },

    /// Delete a collection
    Delete {
        /// Collection ID
        id: String,
    },

    /// Add a recipe to a collection
    Add {
        /// Collection ID
        id: String,

        /// Recipe ID
        recipe: String,
    },

    /// Remove a recipe from a collection
    Remove {
        /// Collection ID
        id: String,

        /// Recipe ID
        recipe: String,
    },
}

impl CollectionCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let coordinator = &app.coordinator;
        match &self.command {
            CollectionSubcommand::List { format } => {
                load(app).await?;
                let collections = coordinator.view().collections;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&collections)?);
                    }
                    OutputFormat::Text => {
                        if collections.is_empty() {
                            println!("No collections found.");
                        }
                        for collection in &collections {
                            println!("{}  {}", collection.id, collection);
                        }
                    }
                }
                Ok(())
            }

            CollectionSubcommand::Show { id } => {
                load(app).await?;
                let view = coordinator.view();
                let collection = view
                    .collection(id)
                    .ok_or_else(|| SyncError::NotFound(format!("collection {}", id)))?;

                println!("{}", collection);
                println!("Created: {}", collection.created_at.format("%Y-%m-%d"));
                for recipe_id in &collection.recipe_ids {
                    match view.recipe(recipe_id) {
                        Some(recipe) => println!("  - {} ({})", recipe.title, recipe_id),
                        None => println!("  - {} (not loaded)", recipe_id),
                    }
                }
                Ok(())
            }

            CollectionSubcommand::Create { name } => {
                let id = coordinator.create_collection(name).await?;
                println!("Created collection: {} ({})", name.trim(), id);
                Ok(())
            }

            CollectionSubcommand::Delete { id } => {
                coordinator.delete_collection(id).await?;
                println!("Deleted collection: {}", id);
                Ok(())
            }

            CollectionSubcommand::Add { id, recipe } => {
                if coordinator.add_to_collection(recipe, id).await? {
                    println!("Added {} to collection {}", recipe, id);
                } else {
                    println!("Collection {} already contains {}", id, recipe);
                }
                Ok(())
            }

            CollectionSubcommand::Remove { id, recipe } => {
                if coordinator.remove_from_collection(recipe, id).await? {
                    println!("Removed {} from collection {}", recipe, id);
                } else {
                    println!("Collection {} does not contain {}", id, recipe);
                }
                Ok(())
            }
        }
    }
}
