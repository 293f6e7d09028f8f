use clap::{Args, Subcommand};

use super::{App, OutputFormat};

#[derive(Args)]
pub struct FeedCommand {
    #[command(subcommand)]
    pub command: FeedSubcommand,
}

#[derive(Subcommand)]
pub enum FeedSubcommand {
    /// List community posts, newest first
    List {
        /// Also fetch the next page of older posts
        #[arg(long)]
        more: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Share a photo that is already hosted
    Post {
        /// URL of the image
        #[arg(long)]
        image_url: String,

        /// Caption
        #[arg(long, short, default_value = "")]
        caption: String,
    },

    /// Like a post, or take the like back
    Like {
        /// Post ID
        post: String,
    },

    /// Show the comments on a post
    Comments {
        /// Post ID
        post: String,
    },

    /// Comment on a post
    Comment {
        /// Post ID
        post: String,

        /// Comment text
        text: String,
    },
}

impl FeedCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            FeedSubcommand::List { more, format } => {
                app.coordinator.load_posts().await?;
                if *more {
                    app.coordinator.load_more_posts().await?;
                }

                let view = app.coordinator.view();
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&view.posts)?);
                    }
                    OutputFormat::Text => {
                        if view.posts.is_empty() {
                            println!("No posts yet.");
                        }
                        for post in &view.posts {
                            let marker = if view.is_liked(&post.id) { "♥" } else { " " };
                            println!("{} [{}] {}", marker, post.id, post);
                        }
                    }
                }
                Ok(())
            }

            FeedSubcommand::Post { image_url, caption } => {
                let id = app.coordinator.create_post(caption, image_url).await?;
                println!("Published post {}", id);
                Ok(())
            }

            FeedSubcommand::Like { post } => {
                // The liked state comes from the loaded feed
                app.coordinator.load_posts().await?;
                if app.coordinator.toggle_like(post).await? {
                    println!("Liked {}", post);
                } else {
                    println!("Unliked {}", post);
                }
                Ok(())
            }

            FeedSubcommand::Comments { post } => {
                let comments = app.coordinator.load_comments(post).await?;
                if comments.is_empty() {
                    println!("No comments yet.");
                }
                for comment in &comments {
                    println!("{}", comment);
                }
                Ok(())
            }

            FeedSubcommand::Comment { post, text } => {
                let comment = app.coordinator.post_comment(post, text).await?;
                println!("Posted comment {}", comment.id);
                Ok(())
            }
        }
    }
}
