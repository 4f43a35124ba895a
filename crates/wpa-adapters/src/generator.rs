use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;
use wpa_core::{generator_seeds, Candidate, GeneratorSeed};

use crate::{AdapterError, AdapterSettings, FetchRequest, SourceAdapter, SourceKind};

pub const DEFAULT_IDENTITY_TEMPLATE: &str = "https://picsum.photos/1920/1080?random={id}";
pub const DEFAULT_THUMBNAIL_TEMPLATE: &str = "https://picsum.photos/400/300?random={id}";

/// Deterministic placeholder source. No network.
///
/// Item `k` of a category draws `table[k % len]`, gets variation `k / len + 1`
/// and image id `seed.id + k`, so repeated calls with the same page produce
/// the same identities.
pub struct GeneratorAdapter {
    settings: AdapterSettings,
    seed_overrides: HashMap<String, Vec<GeneratorSeed>>,
    identity_template: String,
    thumbnail_template: String,
}

impl GeneratorAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            seed_overrides: HashMap::new(),
            identity_template: DEFAULT_IDENTITY_TEMPLATE.to_string(),
            thumbnail_template: DEFAULT_THUMBNAIL_TEMPLATE.to_string(),
        }
    }

    pub fn with_seeds(mut self, category: impl Into<String>, seeds: Vec<GeneratorSeed>) -> Self {
        self.seed_overrides.insert(category.into(), seeds);
        self
    }

    /// `{id}` is replaced with the generated image id.
    pub fn with_identity_template(mut self, template: impl Into<String>) -> Self {
        self.identity_template = template.into();
        self
    }

    pub fn with_thumbnail_template(mut self, template: impl Into<String>) -> Self {
        self.thumbnail_template = template.into();
        self
    }

    fn seeds_for(&self, category: &str) -> &[GeneratorSeed] {
        match self.seed_overrides.get(category) {
            Some(seeds) if !seeds.is_empty() => seeds,
            _ => generator_seeds(category),
        }
    }

    /// Items whose image id was already produced earlier in the same call are
    /// skipped, so the result holds `desired` distinct identities.
    pub fn generate(&self, category: &str, desired: usize, page: u32) -> Vec<Candidate> {
        let seeds = self.seeds_for(category);
        if seeds.is_empty() || desired == 0 {
            return Vec::new();
        }
        let offset = (page.max(1) as usize - 1).saturating_mul(desired);
        // an image id is hit by at most one index per seed
        let end = offset.saturating_add(desired.saturating_mul(seeds.len()));

        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(desired);
        for k in offset..end {
            if out.len() >= desired {
                break;
            }
            let seed = &seeds[k % seeds.len()];
            let image_id = (seed.id as u64).saturating_add(k as u64);
            if !seen.insert(image_id) {
                continue;
            }
            if let Some(candidate) = self.candidate(category, seed, k / seeds.len() + 1, image_id) {
                out.push(candidate);
            }
        }
        out
    }

    fn candidate(&self, category: &str, seed: &GeneratorSeed, variation: usize, image_id: u64) -> Option<Candidate> {
        let image_id = image_id.to_string();
        let image_url = self.identity_template.replace("{id}", &image_id);
        Some(
            Candidate::new(
                &image_url,
                category,
                &self.settings.display_name,
                format!("{} - {category} wallpaper {variation}", seed.author),
            )?
            .with_description(Some(format!(
                "Beautiful {category} wallpaper featuring {}",
                seed.keywords
            )))
            .with_thumbnail(self.thumbnail_template.replace("{id}", &image_id))
            .with_source_url(image_url.clone())
            .with_tags(seed.keywords.split(','))
            .with_resolution("1920x1080"),
        )
    }
}

#[async_trait]
impl SourceAdapter for GeneratorAdapter {
    fn source_id(&self) -> &str {
        &self.settings.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Generator
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        let out = self.generate(&request.category, request.desired, request.page);
        debug!(source_id = %self.settings.source_id, category = %request.category, generated = out.len(), "generated candidates");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GeneratorAdapter {
        GeneratorAdapter::new(AdapterSettings::new("lorem-picsum", "Lorem Picsum", SourceKind::Generator))
    }

    #[test]
    fn identities_follow_seed_id_plus_index() {
        let seeds = vec![
            GeneratorSeed { id: 1, author: "Ada", keywords: "lines, shapes" },
            GeneratorSeed { id: 100, author: "Bo", keywords: "color" },
        ];
        let gen = adapter().with_seeds("abstract", seeds).with_identity_template("img-{id}");

        let out = gen.generate("abstract", 5, 1);
        let ids = out.iter().map(|c| c.image_url.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["img-1", "img-101", "img-3", "img-103", "img-5"]);
        assert_eq!(out[0].title, "Ada - abstract wallpaper 1");
        assert_eq!(out[2].title, "Ada - abstract wallpaper 2");
        assert_eq!(out[0].tags, vec!["lines".to_string(), "shapes".to_string()]);
        assert_eq!(out[0].description.as_deref(), Some("Beautiful abstract wallpaper featuring lines, shapes"));
        assert_eq!(out[0].source_site, "Lorem Picsum");
    }

    #[test]
    fn pages_continue_the_sequence() {
        let gen = adapter().with_identity_template("img-{id}").with_seeds(
            "space",
            vec![GeneratorSeed { id: 1, author: "A", keywords: "k" }],
        );
        let page_two = gen.generate("space", 3, 2);
        let ids = page_two.iter().map(|c| c.image_url.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["img-4", "img-5", "img-6"]);
    }

    #[test]
    fn default_table_and_template_are_deterministic() {
        let gen = adapter();
        let a = gen.generate("nature", 3, 1);
        let b = gen.generate("nature", 3, 1);
        assert_eq!(a, b);
        assert_eq!(a[0].image_url, "https://picsum.photos/1920/1080?random=1018");
        assert_eq!(a[0].thumbnail_url.as_deref(), Some("https://picsum.photos/400/300?random=1018"));
        assert_eq!(a[0].title, "Landscape Photography - nature wallpaper 1");

        let unknown = gen.generate("vaporwave", 1, 1);
        assert_eq!(unknown[0].category, "vaporwave");
        assert_eq!(unknown[0].image_url, format!("https://picsum.photos/1920/1080?random={}", generator_seeds("abstract")[0].id));
    }

    #[test]
    fn one_call_yields_desired_distinct_identities() {
        let gen = adapter();
        for category in wpa_core::default_category_slugs() {
            for page in 1..=8 {
                let out = gen.generate(&category, 150, page);
                let distinct = out.iter().map(|c| c.image_url.as_str()).collect::<HashSet<_>>();
                assert_eq!(out.len(), 150, "{category} page {page}");
                assert_eq!(distinct.len(), 150, "{category} page {page}");
            }
        }
    }

    #[test]
    fn colliding_ids_are_skipped_within_a_call() {
        // k=2 draws id 0 + 2, already produced by k=1 as 1 + 1
        let seeds = vec![
            GeneratorSeed { id: 0, author: "A", keywords: "k" },
            GeneratorSeed { id: 1, author: "B", keywords: "k" },
        ];
        let gen = adapter().with_seeds("abstract", seeds).with_identity_template("img-{id}");
        let ids = gen
            .generate("abstract", 4, 1)
            .into_iter()
            .map(|c| c.image_url)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["img-0", "img-2", "img-4", "img-6"]);
    }

    #[tokio::test]
    async fn fetch_honors_zero_quota() {
        let request = FetchRequest::new("nature", vec![], 0);
        assert!(adapter().fetch(&request).await.unwrap().is_empty());
    }
}
