use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wpa_core::{Candidate, Category, Wallpaper};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Mutable wallpaper counters exposed by the browsing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Downloads,
    Likes,
}

impl Counter {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Counter::Downloads => "downloads",
            Counter::Likes => "likes",
        }
    }
}

/// Sortable columns. Anything outside this list never reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    CreatedAt,
    Downloads,
    Likes,
    Title,
    Id,
}

impl SortColumn {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "created_at" => Some(Self::CreatedAt),
            "downloads" => Some(Self::Downloads),
            "likes" => Some(Self::Likes),
            "title" => Some(Self::Title),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Downloads => "downloads",
            Self::Likes => "likes",
            Self::Title => "title",
            Self::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.trim().eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: SortColumn,
    pub order: SortOrder,
}

impl Default for WallpaperQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            category: None,
            search: None,
            sort: SortColumn::default(),
            order: SortOrder::default(),
        }
    }
}

impl WallpaperQuery {
    /// Normalizes raw request parameters; unknown sort keys fall back to defaults.
    pub fn from_params(
        page: Option<u32>,
        limit: Option<u32>,
        category: Option<String>,
        search: Option<String>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Self {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE),
            category: non_blank(category),
            search: non_blank(search),
            sort: sort_by.and_then(SortColumn::parse).unwrap_or_default(),
            order: sort_order.and_then(SortOrder::parse).unwrap_or_default(),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperPage {
    pub wallpapers: Vec<Wallpaper>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl WallpaperPage {
    pub(crate) fn new(wallpapers: Vec<Wallpaper>, query: &WallpaperQuery, total: i64) -> Self {
        let limit = i64::from(query.limit.max(1));
        Self {
            wallpapers,
            page: query.page,
            limit: query.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Persistence boundary shared by the ingestion pipeline and the browsing API.
///
/// `insert_if_absent` must decide atomically: two concurrent callers with the
/// same `image_url` never both observe `true`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_if_absent(&self, candidate: &Candidate) -> Result<bool, StoreError>;

    /// Recomputes every category's `wallpaper_count`; returns rows touched.
    async fn recompute_category_counts(&self) -> Result<u64, StoreError>;

    async fn categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn list_wallpapers(&self, query: &WallpaperQuery) -> Result<WallpaperPage, StoreError>;

    async fn wallpaper(&self, id: i64) -> Result<Option<Wallpaper>, StoreError>;

    /// Returns the new counter value, or `None` when the wallpaper does not exist.
    async fn increment(&self, id: i64, counter: Counter) -> Result<Option<i64>, StoreError>;
}
