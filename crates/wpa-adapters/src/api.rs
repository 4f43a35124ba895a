use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use wpa_core::Candidate;
use wpa_storage::{Fetch, Url};

use crate::{
    capitalize, fetch_per_term, text_or_none, AdapterError, AdapterSettings, FetchRequest,
    PerTermSource, SourceAdapter, SourceKind, TermRequest,
};

const UNSPLASH_SEARCH: &str = "https://api.unsplash.com/search/photos";
const PEXELS_SEARCH: &str = "https://api.pexels.com/v1/search";
const PICSUM_LIST: &str = "https://picsum.photos/v2/list";
const PICSUM_PAGE_SIZE: usize = 100;

fn api_url(base: &str, params: &[(&str, String)]) -> Result<String, AdapterError> {
    Url::parse_with_params(base, params.iter().map(|(k, v)| (*k, v.as_str())))
        .map(|u| u.to_string())
        .map_err(|e| AdapterError::Message(format!("bad url {base}: {e}")))
}

fn fallback_title(term: &str) -> String {
    format!("{term} wallpaper")
}

#[derive(Debug, Deserialize)]
struct UnsplashSearch {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    description: Option<String>,
    alt_description: Option<String>,
    urls: UnsplashUrls,
    #[serde(default)]
    links: UnsplashLinks,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: Vec<UnsplashTag>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    full: Option<String>,
    small: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UnsplashLinks {
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsplashTag {
    title: String,
}

fn resolution(width: Option<u32>, height: Option<u32>) -> String {
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => format!("{w}x{h}"),
        _ => "High Resolution".to_string(),
    }
}

pub fn parse_unsplash_search(
    body: &str,
    category: &str,
    term: &str,
    site: &str,
) -> Result<Vec<Candidate>, AdapterError> {
    let search: UnsplashSearch = serde_json::from_str(body)?;
    let out = search
        .results
        .into_iter()
        .filter_map(|photo| {
            let image_url = photo.urls.full?;
            let title = photo
                .alt_description
                .clone()
                .and_then(text_or_none)
                .unwrap_or_else(|| fallback_title(term));
            let tags = if photo.tags.is_empty() {
                vec![term.to_string()]
            } else {
                photo.tags.into_iter().map(|t| t.title).collect()
            };
            let mut candidate = Candidate::new(&image_url, category, site, title)?
                .with_description(photo.description.or(photo.alt_description))
                .with_tags(tags)
                .with_resolution(resolution(photo.width, photo.height));
            if let Some(small) = photo.urls.small {
                candidate = candidate.with_thumbnail(small);
            }
            if let Some(html) = photo.links.html {
                candidate = candidate.with_source_url(html);
            }
            Some(candidate)
        })
        .collect();
    Ok(out)
}

/// Keyed search API; inert without an access key.
pub struct UnsplashAdapter {
    settings: AdapterSettings,
    fetcher: Arc<dyn Fetch>,
    access_key: Option<String>,
}

impl UnsplashAdapter {
    pub fn new(settings: AdapterSettings, fetcher: Arc<dyn Fetch>, access_key: Option<String>) -> Self {
        Self {
            settings,
            fetcher,
            access_key,
        }
    }
}

impl PerTermSource for UnsplashAdapter {
    fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    fn term_request(&self, term: &str, request: &FetchRequest) -> Result<TermRequest, AdapterError> {
        let key = self
            .access_key
            .as_deref()
            .ok_or_else(|| AdapterError::Message("unsplash access key missing".to_string()))?;
        let url = api_url(
            UNSPLASH_SEARCH,
            &[
                ("query", term.to_string()),
                ("per_page", request.desired.min(30).to_string()),
                ("page", "1".to_string()),
                ("orientation", "landscape".to_string()),
            ],
        )?;
        Ok(TermRequest {
            url,
            headers: vec![
                ("Authorization", format!("Client-ID {key}")),
                ("Accept-Version", "v1".to_string()),
            ],
        })
    }

    fn parse(&self, body: &str, term: &str, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        parse_unsplash_search(body, &request.category, term, &self.settings.display_name)
    }
}

#[async_trait]
impl SourceAdapter for UnsplashAdapter {
    fn source_id(&self) -> &str {
        &self.settings.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn is_configured(&self) -> bool {
        self.access_key.is_some()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        if !self.is_configured() {
            debug!(source_id = %self.settings.source_id, "no access key; skipping");
            return Ok(Vec::new());
        }
        Ok(fetch_per_term(self, self.fetcher.as_ref(), request).await)
    }
}

#[derive(Debug, Deserialize)]
struct PexelsSearch {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    url: Option<String>,
    alt: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    src: PexelsSrc,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    original: Option<String>,
    medium: Option<String>,
}

pub fn parse_pexels_search(
    body: &str,
    category: &str,
    term: &str,
    site: &str,
) -> Result<Vec<Candidate>, AdapterError> {
    let search: PexelsSearch = serde_json::from_str(body)?;
    let out = search
        .photos
        .into_iter()
        .filter_map(|photo| {
            let image_url = photo.src.original?;
            let title = photo
                .alt
                .clone()
                .and_then(text_or_none)
                .unwrap_or_else(|| fallback_title(term));
            let mut candidate = Candidate::new(&image_url, category, site, title)?
                .with_description(photo.alt)
                .with_tags([term])
                .with_resolution(resolution(photo.width, photo.height));
            if let Some(medium) = photo.src.medium {
                candidate = candidate.with_thumbnail(medium);
            }
            if let Some(url) = photo.url {
                candidate = candidate.with_source_url(url);
            }
            Some(candidate)
        })
        .collect();
    Ok(out)
}

pub struct PexelsAdapter {
    settings: AdapterSettings,
    fetcher: Arc<dyn Fetch>,
    api_key: Option<String>,
}

impl PexelsAdapter {
    pub fn new(settings: AdapterSettings, fetcher: Arc<dyn Fetch>, api_key: Option<String>) -> Self {
        Self {
            settings,
            fetcher,
            api_key,
        }
    }
}

impl PerTermSource for PexelsAdapter {
    fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    fn term_request(&self, term: &str, request: &FetchRequest) -> Result<TermRequest, AdapterError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::Message("pexels api key missing".to_string()))?;
        let url = api_url(
            PEXELS_SEARCH,
            &[
                ("query", term.to_string()),
                ("per_page", request.desired.min(80).to_string()),
                ("page", "1".to_string()),
                ("orientation", "landscape".to_string()),
            ],
        )?;
        Ok(TermRequest {
            url,
            headers: vec![("Authorization", key.to_string())],
        })
    }

    fn parse(&self, body: &str, term: &str, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        parse_pexels_search(body, &request.category, term, &self.settings.display_name)
    }
}

#[async_trait]
impl SourceAdapter for PexelsAdapter {
    fn source_id(&self) -> &str {
        &self.settings.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        if !self.is_configured() {
            debug!(source_id = %self.settings.source_id, "no api key; skipping");
            return Ok(Vec::new());
        }
        Ok(fetch_per_term(self, self.fetcher.as_ref(), request).await)
    }
}

#[derive(Debug, Deserialize)]
struct PicsumPhoto {
    id: String,
    author: String,
    url: Option<String>,
}

/// Turns a Picsum listing page into fixed-size candidates, cycling `terms`
/// for titles and tags.
pub fn parse_picsum_list(
    body: &str,
    category: &str,
    terms: &[String],
    desired: usize,
    site: &str,
) -> Result<Vec<Candidate>, AdapterError> {
    let photos: Vec<PicsumPhoto> = serde_json::from_str(body)?;
    let fallback = [category.to_string()];
    let terms = if terms.is_empty() { &fallback[..] } else { terms };

    let out = photos
        .into_iter()
        .take(desired)
        .enumerate()
        .filter_map(|(idx, photo)| {
            let term = &terms[idx % terms.len()];
            let image_url = format!("https://picsum.photos/id/{}/1920/1080", photo.id);
            let candidate = Candidate::new(
                &image_url,
                category,
                site,
                format!("{} - {category} wallpaper", capitalize(term)),
            )?
            .with_description(Some(format!("Beautiful {term} wallpaper by {}", photo.author)))
            .with_thumbnail(format!("https://picsum.photos/id/{}/400/300", photo.id))
            .with_tags([term.as_str(), category, "wallpaper", "hd", photo.author.as_str()])
            .with_resolution("1920x1080");
            Some(match photo.url {
                Some(url) => candidate.with_source_url(url),
                None => candidate,
            })
        })
        .collect();
    Ok(out)
}

/// Keyless photo listing; one call per fetch.
pub struct PicsumAdapter {
    settings: AdapterSettings,
    fetcher: Arc<dyn Fetch>,
}

impl PicsumAdapter {
    pub fn new(settings: AdapterSettings, fetcher: Arc<dyn Fetch>) -> Self {
        Self { settings, fetcher }
    }

    fn list_url(page: u32) -> Result<String, AdapterError> {
        api_url(
            PICSUM_LIST,
            &[("page", page.to_string()), ("limit", PICSUM_PAGE_SIZE.to_string())],
        )
    }
}

#[async_trait]
impl SourceAdapter for PicsumAdapter {
    fn source_id(&self) -> &str {
        &self.settings.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        if request.desired == 0 {
            return Ok(Vec::new());
        }
        let url = Self::list_url(request.page)?;
        let result = match self.fetcher.get_text(&self.settings.source_id, &url, &[]).await {
            Ok(body) => parse_picsum_list(
                &body,
                &request.category,
                &request.terms,
                request.desired,
                &self.settings.display_name,
            ),
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(candidates) => Ok(candidates),
            Err(err) => {
                warn!(source_id = %self.settings.source_id, url = %url, error = %err, "listing failed");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{read_fixture, ScriptedFetch};

    fn api_settings(source_id: &str) -> AdapterSettings {
        AdapterSettings::new(source_id, source_id, SourceKind::Api)
    }

    #[test]
    fn unsplash_fixture_parses_identity_and_fallbacks() {
        let body = read_fixture("unsplash", "search.json");
        let candidates = parse_unsplash_search(&body, "nature", "mountain", "Unsplash").unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.image_url, "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?ixid=abc&fm=jpg&q=85");
        assert_eq!(first.title, "snow covered mountain during daytime");
        assert_eq!(first.description.as_deref(), Some("Alpine morning"));
        assert_eq!(first.source_url.as_deref(), Some("https://unsplash.com/photos/Bkci_8qcdvQ"));
        assert_eq!(first.tags, vec!["mountain".to_string(), "snow".to_string()]);
        assert_eq!(first.resolution, "6000x4000");
        assert_eq!(first.source_site, "Unsplash");

        let second = &candidates[1];
        assert_eq!(second.title, "mountain wallpaper");
        assert_eq!(second.description, None);
        assert_eq!(second.tags, vec!["mountain".to_string()]);
        assert_eq!(second.resolution, "High Resolution");
    }

    #[test]
    fn pexels_fixture_parses_original_source() {
        let body = read_fixture("pexels", "search.json");
        let candidates = parse_pexels_search(&body, "cars", "sports car", "Pexels").unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].image_url, "https://images.pexels.com/photos/3802510/pexels-photo-3802510.jpeg");
        assert_eq!(candidates[0].thumbnail_url.as_deref(), Some("https://images.pexels.com/photos/3802510/pexels-photo-3802510.jpeg?h=350"));
        assert_eq!(candidates[0].title, "Red sports car on a mountain road");
        assert_eq!(candidates[0].resolution, "5184x3456");
        assert_eq!(candidates[1].title, "sports car wallpaper");
    }

    #[test]
    fn malformed_json_is_an_adapter_error() {
        assert!(matches!(
            parse_pexels_search("<html>rate limited</html>", "cars", "x", "Pexels"),
            Err(AdapterError::Json(_))
        ));
    }

    #[test]
    fn picsum_list_cycles_terms_and_respects_quota() {
        let body = read_fixture("picsum", "list.json");
        let terms = vec!["mountain".to_string(), "forest".to_string()];
        let candidates = parse_picsum_list(&body, "nature", &terms, 3, "Picsum Photos").unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].image_url, "https://picsum.photos/id/10/1920/1080");
        assert_eq!(candidates[0].thumbnail_url.as_deref(), Some("https://picsum.photos/id/10/400/300"));
        assert_eq!(candidates[0].title, "Mountain - nature wallpaper");
        assert_eq!(candidates[1].title, "Forest - nature wallpaper");
        assert_eq!(candidates[2].title, "Mountain - nature wallpaper");
        assert_eq!(
            candidates[1].tags,
            vec!["forest", "nature", "wallpaper", "hd", "Alejandro Escamilla"]
        );
        assert_eq!(candidates[0].source_url.as_deref(), Some("https://unsplash.com/photos/6J--NXulQCs"));
    }

    #[tokio::test]
    async fn unconfigured_api_adapters_make_no_calls() {
        let fetch = Arc::new(ScriptedFetch::default());
        let unsplash = UnsplashAdapter::new(api_settings("unsplash"), fetch.clone(), None);
        let pexels = PexelsAdapter::new(api_settings("pexels"), fetch.clone(), None);
        let request = FetchRequest::new("nature", vec!["mountain".into()], 5);

        assert!(!unsplash.is_configured());
        assert!(unsplash.fetch(&request).await.unwrap().is_empty());
        assert!(pexels.fetch(&request).await.unwrap().is_empty());
        assert!(fetch.urls().await.is_empty());
    }

    #[tokio::test]
    async fn unsplash_request_carries_client_id_and_page_size() {
        let body = read_fixture("unsplash", "search.json");
        let fetch = Arc::new(ScriptedFetch::new(vec![Ok(body)]));
        let adapter = UnsplashAdapter::new(api_settings("unsplash"), fetch.clone(), Some("k3y".into()));
        // the category ordinal never turns into a search page
        let request = FetchRequest::new("nature", vec!["mountain".into()], 50).with_page(3);

        let candidates = adapter.fetch(&request).await.unwrap();
        assert_eq!(candidates.len(), 2);

        let requests = fetch.requests.lock().await;
        let (url, headers) = &requests[0];
        assert!(url.starts_with("https://api.unsplash.com/search/photos?query=mountain&per_page=30&page=1"));
        assert!(url.contains("orientation=landscape"));
        assert!(headers.contains(&("Authorization".to_string(), "Client-ID k3y".to_string())));
    }

    #[tokio::test]
    async fn pexels_asks_for_the_first_page_with_its_key() {
        let body = read_fixture("pexels", "search.json");
        let fetch = Arc::new(ScriptedFetch::new(vec![Ok(body)]));
        let settings = AdapterSettings::new("pexels", "Pexels", SourceKind::Api);
        let adapter = PexelsAdapter::new(settings, fetch.clone(), Some("px".into()));
        let request = FetchRequest::new("cars", vec!["sports car".into()], 120).with_page(6);

        let candidates = adapter.fetch(&request).await.unwrap();
        assert!(candidates.iter().all(|c| c.source_site == "Pexels"));

        let requests = fetch.requests.lock().await;
        let (url, headers) = &requests[0];
        assert!(url.contains("per_page=80&page=1&"));
        assert!(headers.contains(&("Authorization".to_string(), "px".to_string())));
    }

    #[tokio::test]
    async fn picsum_uses_page_hint_and_swallows_failures() {
        let body = read_fixture("picsum", "list.json");
        let fetch = Arc::new(ScriptedFetch::new(vec![Ok(body)]));
        let settings = AdapterSettings::new("picsum", "Picsum Photos", SourceKind::Api);
        let adapter = PicsumAdapter::new(settings, fetch.clone());
        let request = FetchRequest::new("space", vec!["galaxy".into()], 2).with_page(4);

        let candidates = adapter.fetch(&request).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.source_site == "Picsum Photos"));
        assert_eq!(fetch.urls().await, vec!["https://picsum.photos/v2/list?page=4&limit=100".to_string()]);

        // script exhausted: the next call sees a 503
        assert!(adapter.fetch(&request).await.unwrap().is_empty());
    }
}
