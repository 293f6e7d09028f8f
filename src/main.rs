use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    CollectionCommand, ConfigCommand, FeedCommand, RecipeCommand, ReviewCommand, SyncCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "culinary")]
#[command(version)]
#[command(about = "Recipes, favorites, collections and a community feed with an offline cache", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse, author and save recipes
    Recipe(RecipeCommand),

    /// Manage recipe collections
    Collection(CollectionCommand),

    /// Read and write recipe reviews
    Review(ReviewCommand),

    /// Browse and join the community photo feed
    Feed(FeedCommand),

    /// Refresh the local cache from the backend
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "culinary=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Recipe(cmd)) => {
            let app = commands::connect(&config).await?;
            cmd.run(&app).await?;
        }
        Some(Commands::Collection(cmd)) => {
            let app = commands::connect(&config).await?;
            cmd.run(&app).await?;
        }
        Some(Commands::Review(cmd)) => {
            let app = commands::connect(&config).await?;
            cmd.run(&app).await?;
        }
        Some(Commands::Feed(cmd)) => {
            let app = commands::connect(&config).await?;
            cmd.run(&app).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let app = commands::connect(&config).await?;
            cmd.run(&app, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
