use clap::{Args, Subcommand};

use super::{App, OutputFormat};

#[derive(Args)]
pub struct ReviewCommand {
    #[command(subcommand)]
    pub command: ReviewSubcommand,
}

#[derive(Subcommand)]
pub enum ReviewSubcommand {
    /// List reviews of a recipe, newest first
    List {
        /// Recipe ID
        recipe: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Review a recipe
    Add {
        /// Recipe ID
        recipe: String,

        /// Rating from 0 to 5
        #[arg(long, short)]
        rating: f32,

        /// Review text
        #[arg(long, short, default_value = "")]
        text: String,
    },
}

impl ReviewCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ReviewSubcommand::List { recipe, format } => {
                let reviews = app.coordinator.load_reviews(recipe).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&reviews)?);
                    }
                    OutputFormat::Text => {
                        if reviews.is_empty() {
                            println!("No reviews yet.");
                        }
                        for review in &reviews {
                            println!("{}", review);
                        }
                    }
                }
                Ok(())
            }

            ReviewSubcommand::Add {
                recipe,
                rating,
                text,
            } => {
                let review = app.coordinator.submit_review(recipe, *rating, text).await?;
                println!("Posted review {} ({:.1}/5)", review.id, review.rating);
                Ok(())
            }
        }
    }
}
