//! Typed decoding of backend documents.
//!
//! Documents are JSON objects with camelCase keys and millisecond
//! timestamps. Every field has an explicit default applied when it is
//! missing or null; a field present with the wrong type is a decode error.
//!
//! | field              | default            |
//! |--------------------|--------------------|
//! | text fields        | `""`               |
//! | list fields        | `[]`               |
//! | `servings`         | `1`                |
//! | `category`         | `ALL` (also for unknown values) |
//! | timestamps         | Unix epoch         |
//! | `authorName`       | `"Anonymous"`      |
//! | collection `name`  | required           |
//! | post counters      | `0`                |
//!
//! The favorite flag is never read from or written to a recipe document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::RemoteError;
use crate::models::{
    CommunityPost, PostComment, Recipe, RecipeCategory, RecipeCollection, Review, ReviewStats,
};

fn default_servings() -> u32 {
    1
}

fn default_author_name() -> String {
    "Anonymous".to_string()
}

fn servings_or_default<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_else(default_servings))
}

fn author_name_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_author_name))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_category<'de, D>(deserializer: D) -> Result<RecipeCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| RecipeCategory::parse_lenient(&s))
        .unwrap_or_default())
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    ingredients: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    instructions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    prep_time: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    cook_time: u32,
    #[serde(default = "default_servings", deserialize_with = "servings_or_default")]
    servings: u32,
    #[serde(default, deserialize_with = "lenient_category")]
    category: RecipeCategory,
    #[serde(default, deserialize_with = "null_as_default")]
    dietary_tags: Vec<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    created_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    updated_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    review_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    average_rating: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionDocument {
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    created_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    recipe_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    owner_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    recipe_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    author_id: String,
    #[serde(
        default = "default_author_name",
        deserialize_with = "author_name_or_default"
    )]
    author_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    rating: f32,
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    author_id: String,
    #[serde(
        default = "default_author_name",
        deserialize_with = "author_name_or_default"
    )]
    author_name: String,
    #[serde(default)]
    author_profile_image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    post_image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    caption: String,
    #[serde(default, deserialize_with = "null_as_default")]
    timestamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    like_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    comment_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    author_id: String,
    #[serde(
        default = "default_author_name",
        deserialize_with = "author_name_or_default"
    )]
    author_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    timestamp: i64,
}

fn decode<T: for<'de> Deserialize<'de>>(path: &str, doc: &Value) -> Result<T, RemoteError> {
    T::deserialize(doc).map_err(|e| RemoteError::Decode(format!("{}: {}", path, e)))
}

fn encode<T: Serialize>(doc: &T) -> Value {
    // Plain structs of strings and numbers always serialize
    serde_json::to_value(doc).unwrap_or(Value::Null)
}

pub fn decode_recipe(id: &str, doc: &Value) -> Result<Recipe, RemoteError> {
    let d: RecipeDocument = decode(id, doc)?;
    Ok(Recipe {
        id: id.to_string(),
        title: d.title,
        description: d.description,
        ingredients: d.ingredients,
        instructions: d.instructions,
        prep_time: d.prep_time,
        cook_time: d.cook_time,
        servings: d.servings,
        category: d.category,
        dietary_tags: d.dietary_tags,
        image_url: d.image_url,
        author: d.author,
        created_at: millis_to_datetime(d.created_at),
        updated_at: millis_to_datetime(d.updated_at),
        stats: ReviewStats {
            review_count: d.review_count,
            average_rating: d.average_rating,
        },
        is_favorite: false,
    })
}

pub fn encode_recipe(recipe: &Recipe) -> Value {
    encode(&RecipeDocument {
        title: recipe.title.clone(),
        description: recipe.description.clone(),
        ingredients: recipe.ingredients.clone(),
        instructions: recipe.instructions.clone(),
        prep_time: recipe.prep_time,
        cook_time: recipe.cook_time,
        servings: recipe.servings,
        category: recipe.category,
        dietary_tags: recipe.dietary_tags.clone(),
        image_url: recipe.image_url.clone(),
        author: recipe.author.clone(),
        created_at: recipe.created_at.timestamp_millis(),
        updated_at: recipe.updated_at.timestamp_millis(),
        review_count: recipe.stats.review_count,
        average_rating: recipe.stats.average_rating,
    })
}

/// Decodes a collection; `owner_id` comes from the document path.
pub fn decode_collection(
    id: &str,
    owner_id: &str,
    doc: &Value,
) -> Result<RecipeCollection, RemoteError> {
    let d: CollectionDocument = decode(id, doc)?;

    let mut recipe_ids: Vec<String> = Vec::with_capacity(d.recipe_ids.len());
    for rid in d.recipe_ids {
        if !recipe_ids.contains(&rid) {
            recipe_ids.push(rid);
        }
    }

    Ok(RecipeCollection {
        id: id.to_string(),
        name: d.name,
        created_at: millis_to_datetime(d.created_at),
        recipe_ids,
        owner_id: owner_id.to_string(),
    })
}

pub fn encode_collection(collection: &RecipeCollection) -> Value {
    encode(&CollectionDocument {
        name: collection.name.clone(),
        created_at: collection.created_at.timestamp_millis(),
        recipe_ids: collection.recipe_ids.clone(),
        owner_id: collection.owner_id.clone(),
    })
}

pub fn decode_review(id: &str, doc: &Value) -> Result<Review, RemoteError> {
    let d: ReviewDocument = decode(id, doc)?;
    Ok(Review {
        id: id.to_string(),
        recipe_id: d.recipe_id,
        author_id: d.author_id,
        author_name: d.author_name,
        rating: d.rating,
        text: d.text,
        created_at: millis_to_datetime(d.timestamp),
    })
}

pub fn encode_review(review: &Review) -> Value {
    encode(&ReviewDocument {
        recipe_id: review.recipe_id.clone(),
        author_id: review.author_id.clone(),
        author_name: review.author_name.clone(),
        rating: review.rating,
        text: review.text.clone(),
        timestamp: review.created_at.timestamp_millis(),
    })
}

pub fn decode_post(id: &str, doc: &Value) -> Result<CommunityPost, RemoteError> {
    let d: PostDocument = decode(id, doc)?;
    Ok(CommunityPost {
        id: id.to_string(),
        author_id: d.author_id,
        author_name: d.author_name,
        author_image_url: d.author_profile_image_url,
        image_url: d.post_image_url,
        caption: d.caption,
        created_at: millis_to_datetime(d.timestamp),
        like_count: d.like_count,
        comment_count: d.comment_count,
    })
}

pub fn encode_post(post: &CommunityPost) -> Value {
    encode(&PostDocument {
        author_id: post.author_id.clone(),
        author_name: post.author_name.clone(),
        author_profile_image_url: post.author_image_url.clone(),
        post_image_url: post.image_url.clone(),
        caption: post.caption.clone(),
        timestamp: post.created_at.timestamp_millis(),
        like_count: post.like_count,
        comment_count: post.comment_count,
    })
}

/// Decodes a comment; `post_id` comes from the document path.
pub fn decode_comment(id: &str, post_id: &str, doc: &Value) -> Result<PostComment, RemoteError> {
    let d: CommentDocument = decode(id, doc)?;
    Ok(PostComment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        author_id: d.author_id,
        author_name: d.author_name,
        text: d.text,
        created_at: millis_to_datetime(d.timestamp),
    })
}

pub fn encode_comment(comment: &PostComment) -> Value {
    encode(&CommentDocument {
        author_id: comment.author_id.clone(),
        author_name: comment.author_name.clone(),
        text: comment.text.clone(),
        timestamp: comment.created_at.timestamp_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_take_defaults() {
        let recipe = decode_recipe("r1", &json!({ "title": "Toast" })).unwrap();
        assert_eq!(recipe.id, "r1");
        assert_eq!(recipe.title, "Toast");
        assert_eq!(recipe.servings, 1);
        assert_eq!(recipe.category, RecipeCategory::All);
        assert!(recipe.ingredients.is_empty());
        assert_eq!(recipe.created_at, DateTime::UNIX_EPOCH);
        assert_eq!(recipe.stats, ReviewStats::default());
    }

    #[test]
    fn test_null_fields_take_defaults() {
        let recipe = decode_recipe(
            "r1",
            &json!({ "title": null, "ingredients": null, "imageUrl": null }),
        )
        .unwrap();
        assert_eq!(recipe.title, "");
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.image_url.is_none());
    }

    #[test]
    fn test_unknown_category_falls_back_to_all() {
        let recipe = decode_recipe("r1", &json!({ "category": "SNACKS" })).unwrap();
        assert_eq!(recipe.category, RecipeCategory::All);

        let recipe = decode_recipe("r1", &json!({ "category": "VEGAN" })).unwrap();
        assert_eq!(recipe.category, RecipeCategory::Vegan);
    }

    #[test]
    fn test_favorite_flag_is_ignored_in_documents() {
        let recipe = decode_recipe("r1", &json!({ "title": "X", "isFavorite": true })).unwrap();
        assert!(!recipe.is_favorite);

        let encoded = encode_recipe(&recipe.with_favorite(true));
        assert!(encoded.get("isFavorite").is_none());
        assert!(encoded.get("id").is_none());
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let err = decode_recipe("r1", &json!({ "prepTime": "ten" })).unwrap_err();
        assert!(matches!(err, RemoteError::Decode(msg) if msg.starts_with("r1")));
    }

    #[test]
    fn test_recipe_encode_decode() {
        let recipe = Recipe::new("Curry", "chef")
            .with_id("r9")
            .with_ingredients(vec!["rice".into()])
            .with_category(RecipeCategory::Dinner)
            .with_servings(3);

        let decoded = decode_recipe("r9", &encode_recipe(&recipe)).unwrap();
        assert_eq!(decoded.title, "Curry");
        assert_eq!(decoded.category, RecipeCategory::Dinner);
        assert_eq!(decoded.servings, 3);
        assert_eq!(
            decoded.created_at.timestamp_millis(),
            recipe.created_at.timestamp_millis()
        );
    }

    #[test]
    fn test_collection_requires_name_and_dedupes_ids() {
        assert!(decode_collection("c1", "u1", &json!({ "recipeIds": [] })).is_err());

        let collection = decode_collection(
            "c1",
            "u1",
            &json!({ "name": "Desserts", "recipeIds": ["a", "b", "a"], "ownerId": "other" }),
        )
        .unwrap();
        assert_eq!(collection.recipe_ids, vec!["a", "b"]);
        assert_eq!(collection.owner_id, "u1");
    }

    #[test]
    fn test_review_defaults() {
        let review = decode_review("v1", &json!({ "rating": 4.5 })).unwrap();
        assert_eq!(review.author_name, "Anonymous");
        assert_eq!(review.rating, 4.5);
    }

    #[test]
    fn test_post_defaults_and_keys() {
        let post = decode_post(
            "p1",
            &json!({ "authorName": null, "postImageUrl": "https://img/1.jpg", "likeCount": 3 }),
        )
        .unwrap();
        assert_eq!(post.author_name, "Anonymous");
        assert_eq!(post.image_url, "https://img/1.jpg");
        assert_eq!(post.like_count, 3);
        assert_eq!(post.comment_count, 0);

        let encoded = encode_post(&post);
        assert_eq!(encoded["postImageUrl"], "https://img/1.jpg");
        assert!(encoded.get("id").is_none());
    }

    #[test]
    fn test_negative_like_count_is_an_error() {
        assert!(decode_post("p1", &json!({ "likeCount": -1 })).is_err());
    }

    #[test]
    fn test_comment_takes_post_id_from_path() {
        let comment = decode_comment("c1", "p1", &json!({ "text": "Yum" })).unwrap();
        assert_eq!(comment.post_id, "p1");
        assert_eq!(comment.author_name, "Anonymous");
        assert_eq!(comment.text, "Yum");
    }
}
