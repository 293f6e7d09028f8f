//! Reconciliation policy: how fetched data is joined with local state.
//!
//! Everything here is pure. Recipes are treated as values; a changed recipe
//! replaces the old element rather than being edited in place.

use std::collections::BTreeSet;

use crate::models::{Recipe, RecipeCollection};

/// Sets each recipe's favorite flag from membership in `favorite_ids`.
pub fn apply_favorites(recipes: Vec<Recipe>, favorite_ids: &BTreeSet<String>) -> Vec<Recipe> {
    recipes
        .into_iter()
        .map(|r| {
            let is_favorite = favorite_ids.contains(&r.id);
            Recipe { is_favorite, ..r }
        })
        .collect()
}

/// Favorite set to use when the remote favorites could not be fetched.
///
/// A recipe already in the view keeps its flag; otherwise membership in the
/// local favorite cache decides.
pub fn fallback_favorites(
    fetched: &[Recipe],
    previous: &[Recipe],
    cached_favorites: &BTreeSet<String>,
) -> BTreeSet<String> {
    fetched
        .iter()
        .filter(|r| {
            previous
                .iter()
                .find(|p| p.id == r.id)
                .map(|p| p.is_favorite)
                .unwrap_or_else(|| cached_favorites.contains(&r.id))
        })
        .map(|r| r.id.clone())
        .collect()
}

/// Replaces the recipe with the same id. Returns the replaced value.
pub fn replace_recipe(recipes: &mut [Recipe], updated: Recipe) -> Option<Recipe> {
    let slot = recipes.iter_mut().find(|r| r.id == updated.id)?;
    Some(std::mem::replace(slot, updated))
}

/// Replaces the recipe with a copy carrying `is_favorite`. Returns the
/// previous flag, or `None` if the recipe is not present.
pub fn set_favorite_flag(recipes: &mut [Recipe], recipe_id: &str, is_favorite: bool) -> Option<bool> {
    let current = recipes.iter().find(|r| r.id == recipe_id)?;
    let updated = current.with_favorite(is_favorite);
    replace_recipe(recipes, updated).map(|old| old.is_favorite)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEdit {
    Add,
    Remove,
}

/// Applies an idempotent membership edit.
///
/// Returns `None` when the edit would not change the collection.
pub fn edit_membership(
    collection: &RecipeCollection,
    recipe_id: &str,
    edit: MembershipEdit,
) -> Option<RecipeCollection> {
    let present = collection.contains_recipe(recipe_id);
    match edit {
        MembershipEdit::Add if !present => Some(collection.with_recipe(recipe_id)),
        MembershipEdit::Remove if present => Some(collection.without_recipe(recipe_id)),
        _ => None,
    }
}

/// Drops blank lines and surrounding whitespace from a recipe list field.
pub fn clean_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: &str, favorite: bool) -> Recipe {
        Recipe::new(id.to_uppercase(), "chef")
            .with_id(id)
            .with_favorite(favorite)
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_apply_favorites_ignores_incoming_flag() {
        let recipes = vec![recipe("a", true), recipe("b", false)];
        let joined = apply_favorites(recipes, &ids(&["b"]));
        assert!(!joined[0].is_favorite);
        assert!(joined[1].is_favorite);
    }

    #[test]
    fn test_fallback_prefers_previous_view() {
        let fetched = vec![recipe("a", false), recipe("b", false), recipe("c", false)];
        let previous = vec![recipe("a", true), recipe("b", false)];
        // b is cached as favorite but the view already says otherwise
        let cached = ids(&["b", "c"]);

        assert_eq!(fallback_favorites(&fetched, &previous, &cached), ids(&["a", "c"]));
    }

    #[test]
    fn test_set_favorite_flag_replaces_value() {
        let mut recipes = vec![recipe("a", false)];
        let before = recipes[0].clone();

        assert_eq!(set_favorite_flag(&mut recipes, "a", true), Some(false));
        assert!(recipes[0].is_favorite);
        assert!(!before.is_favorite);

        assert_eq!(set_favorite_flag(&mut recipes, "missing", true), None);
    }

    #[test]
    fn test_edit_membership_is_idempotent() {
        let collection = RecipeCollection::new("c1", "Desserts", "u1");

        let added = edit_membership(&collection, "r1", MembershipEdit::Add).unwrap();
        assert_eq!(added.recipe_ids, vec!["r1"]);
        assert!(edit_membership(&added, "r1", MembershipEdit::Add).is_none());

        assert!(edit_membership(&collection, "r1", MembershipEdit::Remove).is_none());
        let removed = edit_membership(&added, "r1", MembershipEdit::Remove).unwrap();
        assert!(removed.recipe_ids.is_empty());
    }

    #[test]
    fn test_clean_lines() {
        let lines = vec!["  2 eggs ".to_string(), "".to_string(), "   ".to_string(), "salt".to_string()];
        assert_eq!(clean_lines(&lines), vec!["2 eggs", "salt"]);
    }
}
