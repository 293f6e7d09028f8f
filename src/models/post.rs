use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A photo post in the community feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityPost {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_image_url: Option<String>,
    /// Already hosted elsewhere; the feed stores only the reference.
    pub image_url: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
    pub like_count: u64,
    pub comment_count: u64,
}

impl CommunityPost {
    pub fn new(
        author_id: impl Into<String>,
        author_name: impl Into<String>,
        image_url: impl Into<String>,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            author_id: author_id.into(),
            author_name: author_name.into(),
            author_image_url: None,
            image_url: image_url.into(),
            caption: caption.into(),
            created_at: Utc::now(),
            like_count: 0,
            comment_count: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Copy with the like count moved by one, never below zero.
    pub fn with_like(&self, liked: bool) -> Self {
        let like_count = if liked {
            self.like_count.saturating_add(1)
        } else {
            self.like_count.saturating_sub(1)
        };
        Self {
            like_count,
            ..self.clone()
        }
    }
}

impl fmt::Display for CommunityPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({})",
            self.author_name,
            self.created_at.format("%Y-%m-%d %H:%M")
        )?;
        if !self.caption.is_empty() {
            writeln!(f, "  {}", self.caption)?;
        }
        writeln!(f, "  Image: {}", self.image_url)?;
        writeln!(
            f,
            "  {} like(s), {} comment(s)",
            self.like_count, self.comment_count
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostComment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl PostComment {
    pub fn new(
        post_id: impl Into<String>,
        author_id: impl Into<String>,
        author_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            post_id: post_id.into(),
            author_id: author_id.into(),
            author_name: author_name.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for PostComment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.author_name,
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.text
        )
    }
}
