//! Core catalog model, category list and search-term table for the wallpaper ingester.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod seeds;

pub use seeds::{generator_seeds, GeneratorSeed};

pub const CRATE_NAME: &str = "wpa-core";

/// Unpersisted record produced by a source adapter.
///
/// `image_url` is the identity used for deduplication. Build candidates with
/// [`Candidate::new`] so an empty identity never leaves an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub source_url: Option<String>,
    pub source_site: String,
    pub category: String,
    pub tags: Vec<String>,
    pub resolution: String,
    pub file_size: Option<i64>,
}

impl Candidate {
    /// Returns `None` when `image_url` is blank.
    pub fn new(
        image_url: impl AsRef<str>,
        category: impl Into<String>,
        source_site: impl Into<String>,
        title: impl Into<String>,
    ) -> Option<Self> {
        let image_url = image_url.as_ref().trim();
        if image_url.is_empty() {
            return None;
        }
        Some(Self {
            title: title.into(),
            description: None,
            image_url: image_url.to_string(),
            thumbnail_url: None,
            source_url: None,
            source_site: source_site.into(),
            category: category.into(),
            tags: Vec::new(),
            resolution: "High Resolution".to_string(),
            file_size: None,
        })
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail_url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(thumbnail_url.into());
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .map(|t| {
                let t: String = t.into();
                t.trim().to_string()
            })
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    pub fn has_identity(&self) -> bool {
        !self.image_url.trim().is_empty()
    }
}

/// Persisted catalog entry. Counters are only ever changed by the browsing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallpaper {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub source_url: Option<String>,
    pub source_site: String,
    pub category: String,
    pub tags: Vec<String>,
    pub resolution: String,
    pub file_size: Option<i64>,
    pub downloads: i64,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallpaper {
    pub fn from_candidate(id: i64, candidate: &Candidate, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            image_url: candidate.image_url.clone(),
            thumbnail_url: candidate.thumbnail_url.clone(),
            source_url: candidate.source_url.clone(),
            source_site: candidate.source_site.clone(),
            category: candidate.category.clone(),
            tags: candidate.tags.clone(),
            resolution: candidate.resolution.clone(),
            file_size: candidate.file_size,
            downloads: 0,
            likes: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Category row. `wallpaper_count` is refreshed by the count reconciler and may lag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub wallpaper_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySeed {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
}

/// Fixed category list, in the order ingestion runs walk it.
pub const DEFAULT_CATEGORIES: [CategorySeed; 8] = [
    CategorySeed { name: "Nature", slug: "nature", description: "Beautiful nature wallpapers" },
    CategorySeed { name: "Abstract", slug: "abstract", description: "Abstract and artistic wallpapers" },
    CategorySeed { name: "Technology", slug: "technology", description: "Tech and digital wallpapers" },
    CategorySeed { name: "Space", slug: "space", description: "Space and astronomy wallpapers" },
    CategorySeed { name: "Animals", slug: "animals", description: "Animal and wildlife wallpapers" },
    CategorySeed { name: "Cars", slug: "cars", description: "Automotive wallpapers" },
    CategorySeed { name: "Gaming", slug: "gaming", description: "Gaming related wallpapers" },
    CategorySeed { name: "Minimalist", slug: "minimalist", description: "Clean and minimal wallpapers" },
];

pub fn default_category_slugs() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.slug.to_string()).collect()
}

const TERM_TABLE: &[(&str, &[&str])] = &[
    (
        "nature",
        &[
            "landscape", "forest", "mountain", "ocean", "sunset", "sunrise", "trees", "flowers",
            "waterfall", "beach", "desert", "lake",
        ],
    ),
    (
        "abstract",
        &[
            "geometric", "pattern", "colorful", "gradient", "texture", "digital art", "fractal",
            "modern art", "shapes", "lines",
        ],
    ),
    (
        "technology",
        &[
            "computer", "coding", "circuit", "digital", "futuristic", "cyber", "neon", "matrix",
            "programming", "tech",
        ],
    ),
    (
        "space",
        &[
            "galaxy", "nebula", "stars", "planet", "universe", "cosmos", "astronaut", "rocket", "moon",
            "earth",
        ],
    ),
    (
        "animals",
        &[
            "wildlife", "lion", "tiger", "elephant", "bird", "wolf", "cat", "dog", "horse", "eagle",
            "bear",
        ],
    ),
    (
        "cars",
        &[
            "supercar", "sports car", "vintage car", "motorcycle", "racing", "luxury car",
            "classic car", "truck",
        ],
    ),
    (
        "gaming",
        &[
            "game art", "fantasy", "sci-fi", "character", "weapon", "armor", "medieval", "dragon",
            "warrior",
        ],
    ),
    (
        "minimalist",
        &[
            "simple", "clean", "white", "minimal", "geometric simple", "monochrome", "elegant",
            "modern",
        ],
    ),
];

/// Ordered search terms for a category. Unknown categories search for their own slug.
pub fn search_terms(category: &str) -> Vec<&str> {
    TERM_TABLE
        .iter()
        .find(|(slug, _)| *slug == category)
        .map(|(_, terms)| terms.to_vec())
        .unwrap_or_else(|| vec![category])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_requires_identity() {
        assert!(Candidate::new("   ", "nature", "Pinterest", "x").is_none());
        let c = Candidate::new(" https://i.example/a.jpg ", "nature", "Pinterest", "x").unwrap();
        assert_eq!(c.image_url, "https://i.example/a.jpg");
        assert!(c.has_identity());
    }

    #[test]
    fn builder_drops_blank_tags_and_descriptions() {
        let c = Candidate::new("u", "space", "Wallhaven", "t")
            .unwrap()
            .with_tags(["galaxy", " ", "stars "])
            .with_description(Some("  ".to_string()));
        assert_eq!(c.tags, vec!["galaxy".to_string(), "stars".to_string()]);
        assert_eq!(c.description, None);
    }

    #[test]
    fn every_default_category_has_terms() {
        for seed in DEFAULT_CATEGORIES {
            let terms = search_terms(seed.slug);
            assert!(terms.len() >= 5, "{} has too few terms", seed.slug);
            assert_ne!(terms, vec![seed.slug]);
        }
        assert_eq!(search_terms("space")[0], "galaxy");
    }

    #[test]
    fn unknown_category_searches_for_itself() {
        assert_eq!(search_terms("underwater"), vec!["underwater"]);
    }

    #[test]
    fn wallpaper_from_candidate_starts_with_zero_counters() {
        let now = Utc::now();
        let c = Candidate::new("u", "cars", "Pexels", "t").unwrap();
        let w = Wallpaper::from_candidate(7, &c, now);
        assert_eq!((w.id, w.downloads, w.likes), (7, 0, 0));
        assert_eq!(w.image_url, "u");
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["category"], "cars");
    }
}
