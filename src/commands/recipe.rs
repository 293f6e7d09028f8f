use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::{find_recipe, load, App, OutputFormat};
use culinary::remote::import_recipe_documents;
use culinary::{Recipe, RecipeCategory};

#[derive(Args)]
pub struct RecipeCommand {
    #[command(subcommand)]
    pub command: RecipeSubcommand,
}

#[derive(Subcommand)]
pub enum RecipeSubcommand {
    /// List recipes
    List {
        /// Only favorites
        #[arg(long)]
        favorites: bool,

        /// Only recipes downloaded for offline reading
        #[arg(long)]
        downloaded: bool,

        /// Filter by category
        #[arg(long)]
        category: Option<RecipeCategory>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a recipe's details
    Show {
        /// Recipe ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Publish a new recipe
    Create {
        /// Title of the recipe
        title: String,

        /// Short description
        #[arg(long)]
        description: Option<String>,

        /// Ingredient (can be repeated)
        #[arg(long = "ingredient", value_name = "INGREDIENT")]
        ingredients: Vec<String>,

        /// Instruction step (can be repeated)
        #[arg(long = "step", value_name = "STEP")]
        steps: Vec<String>,

        /// Prep time in minutes
        #[arg(long)]
        prep_time: Option<u32>,

        /// Cook time in minutes
        #[arg(long)]
        cook_time: Option<u32>,

        /// Number of servings
        #[arg(long)]
        servings: Option<u32>,

        /// Category
        #[arg(long)]
        category: Option<RecipeCategory>,

        /// Dietary tag (can be repeated)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Image URL
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Mark a recipe as favorite
    Favorite {
        /// Recipe ID
        id: String,
    },

    /// Remove a recipe from favorites
    Unfavorite {
        /// Recipe ID
        id: String,
    },

    /// Toggle keeping a recipe for offline reading
    Download {
        /// Recipe ID
        id: String,
    },

    /// Import recipes from a JSON file holding an array of recipe documents
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
}

impl RecipeCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            RecipeSubcommand::List {
                favorites,
                downloaded,
                category,
                format,
            } => {
                load(app).await?;
                let view = app.coordinator.view();
                let recipes: Vec<&Recipe> = view
                    .recipes
                    .iter()
                    .filter(|r| !*favorites || r.is_favorite)
                    .filter(|r| !*downloaded || view.is_downloaded(&r.id))
                    .filter(|r| match category {
                        None | Some(RecipeCategory::All) => true,
                        Some(c) => r.category == *c,
                    })
                    .collect();

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&recipes)?);
                    }
                    OutputFormat::Text => {
                        if recipes.is_empty() {
                            println!("No recipes found.");
                        } else {
                            println!("{:<34} {:<30} {:<10} {:>6}", "ID", "TITLE", "CATEGORY", "RATING");
                            println!("{}", "-".repeat(83));
                            for recipe in recipes {
                                let marker = match (recipe.is_favorite, view.is_downloaded(&recipe.id)) {
                                    (true, true) => "★↓",
                                    (true, false) => "★",
                                    (false, true) => "↓",
                                    (false, false) => "",
                                };
                                println!(
                                    "{:<34} {:<30} {:<10} {:>6.1} {}",
                                    recipe.id,
                                    truncate(&recipe.title, 30),
                                    recipe.category.display_name(),
                                    recipe.stats.average_rating,
                                    marker
                                );
                            }
                        }
                    }
                }
                Ok(())
            }

            RecipeSubcommand::Show { id, format } => {
                load(app).await?;
                let recipe = find_recipe(app, id)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&recipe)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", recipe);
                        let collections = app.coordinator.collections_containing(id);
                        if !collections.is_empty() {
                            let names: Vec<&str> =
                                collections.iter().map(|c| c.name.as_str()).collect();
                            println!("\nIn collections: {}", names.join(", "));
                        }
                        if app.coordinator.view().is_downloaded(id) {
                            println!("Available offline");
                        }
                    }
                }
                Ok(())
            }

            RecipeSubcommand::Create {
                title,
                description,
                ingredients,
                steps,
                prep_time,
                cook_time,
                servings,
                category,
                tags,
                image_url,
            } => {
                let mut draft = Recipe::new(title, "")
                    .with_ingredients(ingredients.clone())
                    .with_instructions(steps.clone())
                    .with_dietary_tags(tags.clone());
                if let Some(d) = description {
                    draft = draft.with_description(d);
                }
                if let Some(t) = prep_time {
                    draft = draft.with_prep_time(*t);
                }
                if let Some(t) = cook_time {
                    draft = draft.with_cook_time(*t);
                }
                if let Some(s) = servings {
                    draft = draft.with_servings(*s);
                }
                if let Some(c) = category {
                    draft = draft.with_category(*c);
                }
                if let Some(url) = image_url {
                    draft = draft.with_image_url(url);
                }

                let id = app.coordinator.create_recipe(draft).await?;
                println!("Created recipe: {} ({})", title.trim(), id);
                Ok(())
            }

            RecipeSubcommand::Favorite { id } => {
                load(app).await?;
                let recipe = find_recipe(app, id)?;
                app.coordinator.toggle_favorite(&recipe, true).await?;
                println!("Added to favorites: {}", recipe.title);
                Ok(())
            }

            RecipeSubcommand::Unfavorite { id } => {
                load(app).await?;
                let recipe = find_recipe(app, id)?;
                app.coordinator.toggle_favorite(&recipe, false).await?;
                println!("Removed from favorites: {}", recipe.title);
                Ok(())
            }

            RecipeSubcommand::Download { id } => {
                load(app).await?;
                let recipe = find_recipe(app, id)?;
                if app.coordinator.toggle_download(&recipe).await? {
                    println!("Downloaded: {}", recipe.title);
                } else {
                    println!("Removed download: {}", recipe.title);
                }
                Ok(())
            }

            RecipeSubcommand::Import { file } => {
                let contents = tokio::fs::read_to_string(file).await?;
                let documents: Vec<serde_json::Value> = serde_json::from_str(&contents)?;
                let ids = import_recipe_documents(app.remote.as_ref(), &documents).await?;
                println!("Imported {} recipe(s)", ids.len());
                Ok(())
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
