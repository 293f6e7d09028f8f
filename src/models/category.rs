use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecipeCategory {
    Breakfast,
    Lunch,
    Dinner,
    Desserts,
    Vegan,
    #[default]
    All,
}

impl RecipeCategory {
    /// Stored form, as written to the cache and to remote documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeCategory::Breakfast => "BREAKFAST",
            RecipeCategory::Lunch => "LUNCH",
            RecipeCategory::Dinner => "DINNER",
            RecipeCategory::Desserts => "DESSERTS",
            RecipeCategory::Vegan => "VEGAN",
            RecipeCategory::All => "ALL",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RecipeCategory::Breakfast => "Breakfast",
            RecipeCategory::Lunch => "Lunch",
            RecipeCategory::Dinner => "Dinner",
            RecipeCategory::Desserts => "Desserts",
            RecipeCategory::Vegan => "Vegan",
            RecipeCategory::All => "All",
        }
    }

    /// Parses a stored category, mapping anything unrecognized to `All`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for RecipeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for RecipeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(RecipeCategory::Breakfast),
            "lunch" => Ok(RecipeCategory::Lunch),
            "dinner" => Ok(RecipeCategory::Dinner),
            "desserts" | "dessert" => Ok(RecipeCategory::Desserts),
            "vegan" => Ok(RecipeCategory::Vegan),
            "all" => Ok(RecipeCategory::All),
            _ => Err(format!(
                "Invalid category '{}'. Valid options: breakfast, lunch, dinner, desserts, vegan, all",
                s
            )),
        }
    }
}
