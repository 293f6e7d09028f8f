use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, user-owned set of recipe ids.
///
/// `recipe_ids` behaves as a set: adding a present id or removing an absent
/// one leaves it unchanged. Insertion order is kept for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeCollection {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub recipe_ids: Vec<String>,
    pub owner_id: String,
}

impl RecipeCollection {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: Utc::now(),
            recipe_ids: Vec::new(),
            owner_id: owner_id.into(),
        }
    }

    pub fn contains_recipe(&self, recipe_id: &str) -> bool {
        self.recipe_ids.iter().any(|id| id == recipe_id)
    }

    /// Returns a copy containing `recipe_id`, unchanged if already present.
    pub fn with_recipe(&self, recipe_id: &str) -> Self {
        let mut next = self.clone();
        if !next.contains_recipe(recipe_id) {
            next.recipe_ids.push(recipe_id.to_string());
        }
        next
    }

    /// Returns a copy without `recipe_id`, unchanged if absent.
    pub fn without_recipe(&self, recipe_id: &str) -> Self {
        let mut next = self.clone();
        next.recipe_ids.retain(|id| id != recipe_id);
        next
    }

    pub fn len(&self) -> usize {
        self.recipe_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipe_ids.is_empty()
    }
}

impl fmt::Display for RecipeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} recipe{})",
            self.name,
            self.len(),
            if self.len() == 1 { "" } else { "s" }
        )
    }
}
