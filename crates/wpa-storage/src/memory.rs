use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use wpa_core::{Candidate, Category, Wallpaper, DEFAULT_CATEGORIES};

use crate::store::{
    CatalogStore, Counter, SortColumn, SortOrder, StoreError, WallpaperPage, WallpaperQuery,
};

#[derive(Debug, Default)]
struct MemoryState {
    wallpapers: Vec<Wallpaper>,
    identities: HashSet<String>,
    categories: Vec<Category>,
}

/// In-process catalog used by tests and dry runs.
///
/// Check and insert happen under one lock, which gives the same guarantee as
/// the unique constraint in Postgres.
#[derive(Debug)]
pub struct MemoryCatalogStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryCatalogStore {
    /// Empty store seeded with the default categories.
    pub fn new() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .enumerate()
            .map(|(idx, seed)| Category {
                id: idx as i64 + 1,
                name: seed.name.to_string(),
                slug: seed.slug.to_string(),
                description: Some(seed.description.to_string()),
                wallpaper_count: 0,
            })
            .collect();
        Self {
            state: Mutex::new(MemoryState {
                categories,
                ..Default::default()
            }),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulates an unreachable backend: every operation fails until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.wallpapers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn wallpapers(&self) -> Vec<Wallpaper> {
        self.state.lock().await.wallpapers.clone()
    }

    /// Overwrites a stored count without touching wallpapers.
    pub async fn set_category_count(&self, slug: &str, count: i64) {
        let mut state = self.state.lock().await;
        if let Some(cat) = state.categories.iter_mut().find(|c| c.slug == slug) {
            cat.wallpaper_count = count;
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_search(w: &Wallpaper, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    w.title.to_lowercase().contains(&needle)
        || w
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
        || w.tags.join(",").to_lowercase().contains(&needle)
}

fn compare(a: &Wallpaper, b: &Wallpaper, column: SortColumn) -> Ordering {
    let primary = match column {
        SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        SortColumn::Downloads => a.downloads.cmp(&b.downloads),
        SortColumn::Likes => a.likes.cmp(&b.likes),
        SortColumn::Title => a.title.cmp(&b.title),
        SortColumn::Id => a.id.cmp(&b.id),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn insert_if_absent(&self, candidate: &Candidate) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if !state.identities.insert(candidate.image_url.clone()) {
            return Ok(false);
        }
        let id = state.wallpapers.len() as i64 + 1;
        state
            .wallpapers
            .push(Wallpaper::from_candidate(id, candidate, Utc::now()));
        Ok(true)
    }

    async fn recompute_category_counts(&self) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for w in &state.wallpapers {
            *counts.entry(w.category.clone()).or_default() += 1;
        }
        for cat in &mut state.categories {
            cat.wallpaper_count = counts.get(&cat.slug).copied().unwrap_or(0);
        }
        Ok(state.categories.len() as u64)
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        self.check_available()?;
        let mut categories = self.state.lock().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_wallpapers(&self, query: &WallpaperQuery) -> Result<WallpaperPage, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let mut rows = state
            .wallpapers
            .iter()
            .filter(|w| query.category.as_deref().map_or(true, |c| w.category == c))
            .filter(|w| query.search.as_deref().map_or(true, |s| matches_search(w, s)))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            let ord = compare(a, b, query.sort);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let total = rows.len() as i64;
        let page_rows = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();
        Ok(WallpaperPage::new(page_rows, query, total))
    }

    async fn wallpaper(&self, id: i64) -> Result<Option<Wallpaper>, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.wallpapers.iter().find(|w| w.id == id).cloned())
    }

    async fn increment(&self, id: i64, counter: Counter) -> Result<Option<i64>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let Some(w) = state.wallpapers.iter_mut().find(|w| w.id == id) else {
            return Ok(None);
        };
        let value = match counter {
            Counter::Downloads => {
                w.downloads += 1;
                w.downloads
            }
            Counter::Likes => {
                w.likes += 1;
                w.likes
            }
        };
        w.updated_at = Utc::now();
        Ok(Some(value))
    }
}
