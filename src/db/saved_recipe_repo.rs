use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

use super::list_codec::encode_list;
use super::{decode_column, from_millis, to_millis, to_u32, CacheError};
use crate::models::{Recipe, RecipeCategory, ReviewStats};

/// A recipe snapshot kept on the device.
///
/// A row exists while at least one of `is_favorite` or `is_downloaded` is
/// set; clearing the last flag deletes it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRecipe {
    pub recipe: Recipe,
    pub is_favorite: bool,
    pub is_downloaded: bool,
    pub last_updated: DateTime<Utc>,
}

impl CachedRecipe {
    pub fn new(recipe: Recipe, is_favorite: bool, is_downloaded: bool) -> Self {
        Self {
            recipe,
            is_favorite,
            is_downloaded,
            last_updated: Utc::now(),
        }
    }

    /// The snapshot as a view recipe, with the persisted favorite flag.
    pub fn into_recipe(self) -> Recipe {
        Recipe {
            is_favorite: self.is_favorite,
            ..self.recipe
        }
    }
}

/// Which persisted flag an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFlag {
    Favorite,
    Downloaded,
}

impl CacheFlag {
    fn column(&self) -> &'static str {
        match self {
            CacheFlag::Favorite => "is_favorite",
            CacheFlag::Downloaded => "is_downloaded",
        }
    }
}

#[derive(Clone)]
pub struct SavedRecipeRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SavedRecipeRow {
    id: String,
    title: String,
    description: String,
    ingredients: String,
    instructions: String,
    prep_time: i64,
    cook_time: i64,
    servings: i64,
    category: String,
    dietary_tags: String,
    image_url: Option<String>,
    author: String,
    created_at: i64,
    updated_at: i64,
    review_count: i64,
    average_rating: f64,
    is_favorite: bool,
    is_downloaded: bool,
    last_updated: i64,
}

impl SavedRecipeRow {
    fn into_cached(self) -> Result<CachedRecipe, CacheError> {
        let id = self.id.as_str();
        let recipe = Recipe {
            ingredients: decode_column(id, "ingredients", &self.ingredients)?,
            instructions: decode_column(id, "instructions", &self.instructions)?,
            dietary_tags: decode_column(id, "dietary_tags", &self.dietary_tags)?,
            prep_time: to_u32(id, "prep_time", self.prep_time)?,
            cook_time: to_u32(id, "cook_time", self.cook_time)?,
            servings: to_u32(id, "servings", self.servings)?,
            category: RecipeCategory::parse_lenient(&self.category),
            created_at: from_millis(id, self.created_at)?,
            updated_at: from_millis(id, self.updated_at)?,
            stats: ReviewStats {
                review_count: to_u32(id, "review_count", self.review_count)?,
                average_rating: self.average_rating,
            },
            is_favorite: self.is_favorite,
            id: self.id.clone(),
            title: self.title,
            description: self.description,
            image_url: self.image_url,
            author: self.author,
        };

        Ok(CachedRecipe {
            last_updated: from_millis(&self.id, self.last_updated)?,
            is_favorite: self.is_favorite,
            is_downloaded: self.is_downloaded,
            recipe,
        })
    }
}

const INSERT_ROW_SQL: &str = r#"
    INSERT INTO saved_recipes (
        id, title, description, ingredients, instructions, prep_time, cook_time, servings,
        category, dietary_tags, image_url, author, created_at, updated_at,
        review_count, average_rating, is_favorite, is_downloaded, last_updated
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        title = excluded.title,
        description = excluded.description,
        ingredients = excluded.ingredients,
        instructions = excluded.instructions,
        prep_time = excluded.prep_time,
        cook_time = excluded.cook_time,
        servings = excluded.servings,
        category = excluded.category,
        dietary_tags = excluded.dietary_tags,
        image_url = excluded.image_url,
        author = excluded.author,
        created_at = excluded.created_at,
        updated_at = excluded.updated_at,
        review_count = excluded.review_count,
        average_rating = excluded.average_rating,
        last_updated = excluded.last_updated
"#;

impl SavedRecipeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the snapshot and both flags.
    pub async fn upsert(&self, cached: &CachedRecipe) -> Result<(), CacheError> {
        let mut conn = self.pool.acquire().await?;
        upsert_row(&mut conn, cached).await
    }

    /// Stores `recipe` with `flag` set, keeping the other flag as it was.
    pub async fn mark(&self, recipe: &Recipe, flag: CacheFlag) -> Result<(), CacheError> {
        let mut conn = self.pool.acquire().await?;
        mark_row(&mut conn, recipe, flag).await
    }

    /// Clears `flag` on a cached recipe, deleting the row if no flag is left.
    pub async fn unmark(&self, id: &str, flag: CacheFlag) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;
        unmark_row(&mut tx, id, flag).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<CachedRecipe>, CacheError> {
        let row: Option<SavedRecipeRow> =
            sqlx::query_as("SELECT * FROM saved_recipes WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(SavedRecipeRow::into_cached).transpose()
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM saved_recipes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM saved_recipes")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<CachedRecipe>, CacheError> {
        self.fetch_where("1 = 1").await
    }

    pub async fn list_favorites(&self) -> Result<Vec<CachedRecipe>, CacheError> {
        self.fetch_where("is_favorite = 1").await
    }

    pub async fn list_downloaded(&self) -> Result<Vec<CachedRecipe>, CacheError> {
        self.fetch_where("is_downloaded = 1").await
    }

    pub async fn favorite_ids(&self) -> Result<BTreeSet<String>, CacheError> {
        self.ids_where("is_favorite = 1").await
    }

    pub async fn downloaded_ids(&self) -> Result<BTreeSet<String>, CacheError> {
        self.ids_where("is_downloaded = 1").await
    }

    pub async fn list_updated_after(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<CachedRecipe>, CacheError> {
        let rows: Vec<SavedRecipeRow> = sqlx::query_as(
            "SELECT * FROM saved_recipes WHERE last_updated > ? ORDER BY last_updated",
        )
        .bind(to_millis(since))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SavedRecipeRow::into_cached).collect()
    }

    /// Makes the favorite flags match `remote_favorites` exactly.
    ///
    /// Remote favorites are stored (refreshing their snapshots); local
    /// favorites absent from the remote set lose the flag. Runs in one
    /// transaction.
    pub async fn reconcile_favorites(&self, remote_favorites: &[Recipe]) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;

        // The first statement must write: a transaction that reads first
        // cannot wait for the write lock and fails with SQLITE_BUSY.
        sqlx::query("UPDATE saved_recipes SET is_favorite = 0 WHERE is_favorite = 1")
            .execute(&mut *tx)
            .await?;

        for recipe in remote_favorites {
            mark_row(&mut tx, recipe, CacheFlag::Favorite).await?;
        }

        sqlx::query("DELETE FROM saved_recipes WHERE is_favorite = 0 AND is_downloaded = 0")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_where(&self, predicate: &str) -> Result<Vec<CachedRecipe>, CacheError> {
        let sql = format!(
            "SELECT * FROM saved_recipes WHERE {} ORDER BY title COLLATE NOCASE, id",
            predicate
        );
        let rows: Vec<SavedRecipeRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(SavedRecipeRow::into_cached).collect()
    }

    async fn ids_where(&self, predicate: &str) -> Result<BTreeSet<String>, CacheError> {
        let sql = format!("SELECT id FROM saved_recipes WHERE {}", predicate);
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

async fn upsert_row(conn: &mut SqliteConnection, cached: &CachedRecipe) -> Result<(), CacheError> {
    let sql = format!(
        "{},
        is_favorite = excluded.is_favorite,
        is_downloaded = excluded.is_downloaded",
        INSERT_ROW_SQL
    );
    write_row(conn, &sql, cached).await
}

/// Sets one flag in a single statement, so concurrent marks only ever
/// wait on each other.
async fn mark_row(
    conn: &mut SqliteConnection,
    recipe: &Recipe,
    flag: CacheFlag,
) -> Result<(), CacheError> {
    let sql = format!("{},\n        {} = 1", INSERT_ROW_SQL, flag.column());
    let cached = CachedRecipe::new(
        recipe.clone(),
        flag == CacheFlag::Favorite,
        flag == CacheFlag::Downloaded,
    );
    write_row(conn, &sql, &cached).await
}

async fn write_row(
    conn: &mut SqliteConnection,
    sql: &str,
    cached: &CachedRecipe,
) -> Result<(), CacheError> {
    let recipe = &cached.recipe;
    sqlx::query(sql)
        .bind(&recipe.id)
        .bind(&recipe.title)
        .bind(&recipe.description)
        .bind(encode_list(&recipe.ingredients))
        .bind(encode_list(&recipe.instructions))
        .bind(i64::from(recipe.prep_time))
        .bind(i64::from(recipe.cook_time))
        .bind(i64::from(recipe.servings))
        .bind(recipe.category.as_str())
        .bind(encode_list(&recipe.dietary_tags))
        .bind(&recipe.image_url)
        .bind(&recipe.author)
        .bind(to_millis(recipe.created_at))
        .bind(to_millis(recipe.updated_at))
        .bind(i64::from(recipe.stats.review_count))
        .bind(recipe.stats.average_rating)
        .bind(cached.is_favorite)
        .bind(cached.is_downloaded)
        .bind(to_millis(cached.last_updated))
        .execute(conn)
        .await?;
    Ok(())
}

async fn unmark_row(conn: &mut SqliteConnection, id: &str, flag: CacheFlag) -> Result<(), CacheError> {
    let sql = format!("UPDATE saved_recipes SET {} = 0 WHERE id = ?", flag.column());
    sqlx::query(&sql).bind(id).execute(&mut *conn).await?;

    sqlx::query("DELETE FROM saved_recipes WHERE id = ? AND is_favorite = 0 AND is_downloaded = 0")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
