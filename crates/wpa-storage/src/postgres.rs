use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use wpa_core::{Candidate, Category, Wallpaper};

use crate::store::{CatalogStore, Counter, StoreError, WallpaperPage, WallpaperQuery};

const WALLPAPER_COLUMNS: &str = "id, title, description, image_url, thumbnail_url, source_url, \
     source_site, category, tags, resolution, file_size, downloads, likes, created_at, updated_at";

/// Postgres-backed catalog. Open once at process start, [`close`](Self::close) at shutdown.
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies `migrations/` (schema + default categories).
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("catalog migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn wallpaper_from_row(row: &PgRow) -> Result<Wallpaper, sqlx::Error> {
    Ok(Wallpaper {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        source_url: row.try_get("source_url")?,
        source_site: row.try_get("source_site")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        resolution: row.try_get("resolution")?,
        file_size: row.try_get("file_size")?,
        downloads: row.try_get("downloads")?,
        likes: row.try_get("likes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Escapes LIKE wildcards so user search text matches literally.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a WallpaperQuery) {
    builder.push(" WHERE TRUE");
    if let Some(category) = &query.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR array_to_string(tags, ',') ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn insert_if_absent(&self, candidate: &Candidate) -> Result<bool, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO wallpapers
                (title, description, image_url, thumbnail_url, source_url, source_site,
                 category, tags, resolution, file_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (image_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&candidate.title)
        .bind(&candidate.description)
        .bind(&candidate.image_url)
        .bind(&candidate.thumbnail_url)
        .bind(&candidate.source_url)
        .bind(&candidate.source_site)
        .bind(&candidate.category)
        .bind(&candidate.tags)
        .bind(&candidate.resolution)
        .bind(candidate.file_size)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            debug!(image_url = %candidate.image_url, "wallpaper already stored");
        }
        Ok(inserted.is_some())
    }

    async fn recompute_category_counts(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE categories c
               SET wallpaper_count = (
                   SELECT COUNT(*) FROM wallpapers w WHERE w.category = c.slug
               )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, slug, description, wallpaper_count FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Category {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                slug: row.try_get("slug")?,
                description: row.try_get("description")?,
                wallpaper_count: row.try_get("wallpaper_count")?,
            });
        }
        Ok(out)
    }

    async fn list_wallpapers(&self, query: &WallpaperQuery) -> Result<WallpaperPage, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM wallpapers");
        push_filters(&mut count, query);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get("total")?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(WALLPAPER_COLUMNS).push(" FROM wallpapers");
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(query.sort.as_sql())
            .push(" ")
            .push(query.order.as_sql())
            .push(", id ")
            .push(query.order.as_sql())
            .push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows = select.build().fetch_all(&self.pool).await?;
        let wallpapers = rows
            .iter()
            .map(wallpaper_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WallpaperPage::new(wallpapers, query, total))
    }

    async fn wallpaper(&self, id: i64) -> Result<Option<Wallpaper>, StoreError> {
        let sql = format!("SELECT {WALLPAPER_COLUMNS} FROM wallpapers WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(wallpaper_from_row).transpose()?)
    }

    async fn increment(&self, id: i64, counter: Counter) -> Result<Option<i64>, StoreError> {
        let column = counter.column();
        let sql = format!(
            "UPDATE wallpapers SET {column} = {column} + 1, updated_at = NOW() WHERE id = $1 RETURNING {column}"
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.try_get::<i64, _>(0)).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("lake"), "%lake%");
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }

    #[test]
    fn list_sql_is_parameterized() {
        let query = WallpaperQuery::from_params(
            Some(2),
            Some(10),
            Some("space".into()),
            Some("nebula".into()),
            Some("likes"),
            Some("asc"),
        );
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM wallpapers");
        push_filters(&mut builder, &query);
        let sql = builder.sql();
        assert!(sql.contains("category = $1"));
        assert!(sql.contains("title ILIKE $2"));
        assert!(!sql.contains("space"));
        assert!(!sql.contains("nebula"));
    }

    async fn store_from_env() -> Option<PgCatalogStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgCatalogStore::connect(&url).await.ok()?;
        store.migrate().await.ok()?;
        Some(store)
    }

    #[tokio::test]
    async fn postgres_insert_if_absent_is_unique_by_image_url() {
        let Some(store) = store_from_env().await else {
            return;
        };
        let unique = format!("https://example.test/pg-dedup/{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let candidate = Candidate::new(&unique, "nature", "Test", "pg dedup").unwrap();
        assert!(store.insert_if_absent(&candidate).await.unwrap());
        assert!(!store.insert_if_absent(&candidate).await.unwrap());
        let touched = store.recompute_category_counts().await.unwrap();
        assert!(touched >= 8);
        store.close().await;
    }
}
