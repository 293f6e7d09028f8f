use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::RecipeCategory;

/// Aggregate review figures stored on the recipe document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ReviewStats {
    pub review_count: u32,
    pub average_rating: f64,
}

impl ReviewStats {
    /// Folds one more rating into the running mean.
    pub fn with_rating(&self, rating: f32) -> Self {
        let old_count = f64::from(self.review_count);
        let new_count = self.review_count + 1;
        Self {
            review_count: new_count,
            average_rating: (self.average_rating * old_count + f64::from(rating))
                / f64::from(new_count),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: u32, // minutes
    pub cook_time: u32, // minutes
    pub servings: u32,
    pub category: RecipeCategory,
    pub dietary_tags: Vec<String>,
    pub image_url: Option<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stats: ReviewStats,
    /// Derived from the local favorites cache, never from the remote document.
    pub is_favorite: bool,
}

impl Recipe {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            description: String::new(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            prep_time: 0,
            cook_time: 0,
            servings: 1,
            category: RecipeCategory::All,
            dietary_tags: Vec::new(),
            image_url: None,
            author: author.into(),
            created_at: now,
            updated_at: now,
            stats: ReviewStats::default(),
            is_favorite: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ingredients(mut self, ingredients: Vec<String>) -> Self {
        self.ingredients = ingredients;
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_prep_time(mut self, minutes: u32) -> Self {
        self.prep_time = minutes;
        self
    }

    pub fn with_cook_time(mut self, minutes: u32) -> Self {
        self.cook_time = minutes;
        self
    }

    pub fn with_servings(mut self, servings: u32) -> Self {
        self.servings = servings;
        self
    }

    pub fn with_category(mut self, category: RecipeCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_dietary_tags(mut self, tags: Vec<String>) -> Self {
        self.dietary_tags = tags;
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_stats(mut self, stats: ReviewStats) -> Self {
        self.stats = stats;
        self
    }

    /// Returns a copy carrying the given favorite flag.
    pub fn with_favorite(&self, is_favorite: bool) -> Self {
        Self {
            is_favorite,
            ..self.clone()
        }
    }

    pub fn total_time(&self) -> u32 {
        self.prep_time + self.cook_time
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.dietary_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_favorite { " ★" } else { "" };
        writeln!(f, "{}{}", self.title, marker)?;
        writeln!(f, "{}", "=".repeat(self.title.chars().count()))?;

        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
        }

        writeln!(f, "Category: {}", self.category)?;
        writeln!(f, "Servings: {}", self.servings)?;

        if self.total_time() > 0 {
            writeln!(
                f,
                "Time: {} min (prep: {} min, cook: {} min)",
                self.total_time(),
                self.prep_time,
                self.cook_time
            )?;
        }

        if !self.dietary_tags.is_empty() {
            writeln!(f, "Tags: {}", self.dietary_tags.join(", "))?;
        }

        if self.stats.review_count > 0 {
            writeln!(
                f,
                "Rating: {:.1} ({} review{})",
                self.stats.average_rating,
                self.stats.review_count,
                if self.stats.review_count == 1 { "" } else { "s" }
            )?;
        }

        if !self.ingredients.is_empty() {
            writeln!(f, "\nIngredients:")?;
            for ingredient in &self.ingredients {
                writeln!(f, "  - {}", ingredient)?;
            }
        }

        if !self.instructions.is_empty() {
            writeln!(f, "\nInstructions:")?;
            for (i, step) in self.instructions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, step)?;
            }
        }

        Ok(())
    }
}
