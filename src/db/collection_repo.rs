use sqlx::{SqliteConnection, SqlitePool};

use super::list_codec::encode_list;
use super::{decode_column, from_millis, to_millis, CacheError};
use crate::models::RecipeCollection;

#[derive(Clone)]
pub struct CollectionRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: String,
    name: String,
    created_at: i64,
    recipe_ids: String,
    owner_id: String,
}

impl CollectionRow {
    fn into_collection(self) -> Result<RecipeCollection, CacheError> {
        Ok(RecipeCollection {
            created_at: from_millis(&self.id, self.created_at)?,
            recipe_ids: decode_column(&self.id, "recipe_ids", &self.recipe_ids)?,
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
        })
    }
}

impl CollectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, collection: &RecipeCollection) -> Result<(), CacheError> {
        let mut conn = self.pool.acquire().await?;
        upsert_row(&mut conn, collection).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<RecipeCollection>, CacheError> {
        let row: Option<CollectionRow> = sqlx::query_as("SELECT * FROM collections WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CollectionRow::into_collection).transpose()
    }

    /// Lists collections, newest first.
    pub async fn list(&self) -> Result<Vec<RecipeCollection>, CacheError> {
        let rows: Vec<CollectionRow> =
            sqlx::query_as("SELECT * FROM collections ORDER BY created_at DESC, name")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(CollectionRow::into_collection).collect()
    }

    pub async fn list_containing(
        &self,
        recipe_id: &str,
    ) -> Result<Vec<RecipeCollection>, CacheError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|c| c.contains_recipe(recipe_id))
            .collect())
    }

    pub async fn delete(&self, id: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM collections")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces every cached collection with `collections` in one transaction.
    pub async fn replace_all(&self, collections: &[RecipeCollection]) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM collections")
            .execute(&mut *tx)
            .await?;

        for collection in collections {
            upsert_row(&mut tx, collection).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_row(
    conn: &mut SqliteConnection,
    collection: &RecipeCollection,
) -> Result<(), CacheError> {
    sqlx::query(
        r#"
        INSERT INTO collections (id, name, created_at, recipe_ids, owner_id)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            created_at = excluded.created_at,
            recipe_ids = excluded.recipe_ids,
            owner_id = excluded.owner_id
        "#,
    )
    .bind(&collection.id)
    .bind(&collection.name)
    .bind(to_millis(collection.created_at))
    .bind(encode_list(&collection.recipe_ids))
    .bind(&collection.owner_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_cache;
    use chrono::{Duration, Utc};

    fn collection(id: &str, name: &str) -> RecipeCollection {
        RecipeCollection::new(id, name, "user1")
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        let c = collection("c1", "Desserts")
            .with_recipe("r1")
            .with_recipe("r2");
        repo.upsert(&c).await.unwrap();

        let fetched = repo.get("c1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Desserts");
        assert_eq!(fetched.recipe_ids, vec!["r1", "r2"]);
        assert_eq!(fetched.owner_id, "user1");
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        let c = collection("c1", "Desserts").with_recipe("r1");
        repo.upsert(&c).await.unwrap();
        repo.upsert(&c.without_recipe("r1")).await.unwrap();
        repo.upsert(&c.without_recipe("r1")).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].recipe_ids.is_empty());
    }

    #[tokio::test]
    async fn test_empty_recipe_ids_roundtrip() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        repo.upsert(&collection("c1", "Empty")).await.unwrap();
        let fetched = repo.get("c1").await.unwrap().unwrap();
        assert_eq!(fetched.recipe_ids, Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        let now = Utc::now();
        let mut older = collection("c1", "Older");
        older.created_at = now - Duration::hours(1);
        let mut newer = collection("c2", "Newer");
        newer.created_at = now;

        repo.upsert(&older).await.unwrap();
        repo.upsert(&newer).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn test_delete_and_missing_get() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        repo.upsert(&collection("c1", "Gone")).await.unwrap();
        repo.delete("c1").await.unwrap();
        assert!(repo.get("c1").await.unwrap().is_none());

        // Deleting again is harmless
        repo.delete("c1").await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_all() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        repo.upsert(&collection("stale", "Stale")).await.unwrap();
        repo.replace_all(&[collection("a", "A"), collection("b", "B")])
            .await
            .unwrap();

        let mut ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);

        repo.clear_all().await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_containing() {
        let ctx = setup_cache().await;
        let repo = ctx.collections();

        repo.upsert(&collection("a", "A").with_recipe("r1")).await.unwrap();
        repo.upsert(&collection("b", "B")).await.unwrap();

        let found = repo.list_containing("r1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }
}
