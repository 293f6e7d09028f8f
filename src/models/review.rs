use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_RATING: f32 = 0.0;
pub const MAX_RATING: f32 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: String,
    pub recipe_id: String,
    pub author_id: String,
    pub author_name: String,
    pub rating: f32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        recipe_id: impl Into<String>,
        author_id: impl Into<String>,
        author_name: impl Into<String>,
        rating: f32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            recipe_id: recipe_id.into(),
            author_id: author_id.into(),
            author_name: author_name.into(),
            rating,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_valid_rating(rating: f32) -> bool {
        rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating)
    }
}

impl fmt::Display for Review {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}/5 by {} ({})",
            self.rating,
            self.author_name,
            self.created_at.format("%Y-%m-%d")
        )?;
        if !self.text.is_empty() {
            write!(f, ": {}", self.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(Review::is_valid_rating(0.0));
        assert!(Review::is_valid_rating(5.0));
        assert!(Review::is_valid_rating(3.5));
        assert!(!Review::is_valid_rating(5.5));
        assert!(!Review::is_valid_rating(-1.0));
        assert!(!Review::is_valid_rating(f32::NAN));
    }

    #[test]
    fn test_review_display() {
        let review = Review::new("r1", "u1", "Sam", 4.0, "Great");
        let output = format!("{}", review);
        assert!(output.starts_with("4.0/5 by Sam"));
        assert!(output.ends_with(": Great"));
    }
}
