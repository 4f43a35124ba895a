use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde_json::Value as JsonValue;
use wpa_core::Candidate;
use wpa_storage::{Fetch, Url};

use crate::{
    fetch_per_term, json_str, json_u64, select_first_attr, select_first_text, selector,
    text_or_none, AdapterError, AdapterSettings, FetchRequest, PerTermSource, SourceAdapter,
    SourceKind, TermRequest,
};

const PINTEREST_SEARCH: &str = "https://www.pinterest.com/search/pins/";
const WALLHAVEN_SEARCH: &str = "https://wallhaven.cc/search";
const PWS_MARKER: &str = "__PWS_DATA__";

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

fn browser_headers() -> Vec<(&'static str, String)> {
    vec![
        ("Accept", BROWSER_ACCEPT.to_string()),
        ("Accept-Language", "en-US,en;q=0.5".to_string()),
        ("Upgrade-Insecure-Requests", "1".to_string()),
    ]
}

/// Rewrites the first pinimg size segment (`/236x/`, `/474x316/`) to `/originals/`.
pub fn upgrade_pinimg_url(url: &str) -> String {
    if !url.contains("pinimg.com") {
        return url.to_string();
    }
    let mut replaced = false;
    url.split('/')
        .enumerate()
        .map(|(idx, segment)| {
            // segments 0..=2 are scheme and host
            if !replaced && idx > 2 && is_size_segment(segment) {
                replaced = true;
                "originals"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_size_segment(segment: &str) -> bool {
    let Some((width, height)) = segment.split_once('x') else {
        return false;
    };
    !width.is_empty()
        && width.chars().all(|c| c.is_ascii_digit())
        && height.chars().all(|c| c.is_ascii_digit())
}

pub struct PinterestAdapter {
    settings: AdapterSettings,
    fetcher: Arc<dyn Fetch>,
}

impl PinterestAdapter {
    pub fn new(settings: AdapterSettings, fetcher: Arc<dyn Fetch>) -> Self {
        Self { settings, fetcher }
    }

    fn search_url(term: &str) -> Result<Url, AdapterError> {
        let query = format!("{term} wallpaper 4k");
        Url::parse_with_params(PINTEREST_SEARCH, &[("q", query.as_str()), ("rs", "typed")])
            .map_err(|e| AdapterError::Message(format!("pinterest url: {e}")))
    }
}

impl PerTermSource for PinterestAdapter {
    fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    fn term_request(&self, term: &str, _request: &FetchRequest) -> Result<TermRequest, AdapterError> {
        Ok(TermRequest {
            url: Self::search_url(term)?.to_string(),
            headers: browser_headers(),
        })
    }

    fn parse(&self, body: &str, term: &str, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        let search_url = Self::search_url(term)?;
        parse_pinterest_page(
            body,
            &request.category,
            term,
            search_url.as_str(),
            self.settings.max_per_term,
            &self.settings.display_name,
        )
    }
}

#[async_trait]
impl SourceAdapter for PinterestAdapter {
    fn source_id(&self) -> &str {
        &self.settings.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        Ok(fetch_per_term(self, self.fetcher.as_ref(), request).await)
    }
}

fn pws_data(document: &Html) -> Result<Option<JsonValue>, AdapterError> {
    let scripts = selector("script")?;
    for script in document.select(&scripts) {
        let text = script.text().collect::<String>();
        let payload = if script.value().id() == Some(PWS_MARKER) {
            text.as_str()
        } else if let Some(pos) = text.find(PWS_MARKER) {
            let rest = &text[pos..];
            match (rest.find('{'), rest.rfind('}')) {
                (Some(start), Some(end)) if end > start => &rest[start..=end],
                _ => continue,
            }
        } else {
            continue;
        };
        if let Ok(value) = serde_json::from_str::<JsonValue>(payload) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Depth-first walk collecting objects that carry `images.orig.url`.
fn collect_pins<'a>(value: &'a JsonValue, out: &mut Vec<&'a JsonValue>) {
    match value {
        JsonValue::Object(map) => {
            if json_str(value, &["images", "orig", "url"]).is_some() {
                out.push(value);
                return;
            }
            for child in map.values() {
                collect_pins(child, out);
            }
        }
        JsonValue::Array(items) => {
            for child in items {
                collect_pins(child, out);
            }
        }
        _ => {}
    }
}

pub fn parse_pinterest_page(
    html: &str,
    category: &str,
    term: &str,
    search_url: &str,
    max: usize,
    site: &str,
) -> Result<Vec<Candidate>, AdapterError> {
    let document = Html::parse_document(html);
    let fallback_title = format!("{category} wallpaper from {site}");
    let description = Some(format!("Beautiful {category} wallpaper found on {site}"));
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    if let Some(data) = pws_data(&document)? {
        let mut pins = Vec::new();
        collect_pins(&data, &mut pins);
        for pin in pins {
            if out.len() >= max {
                break;
            }
            let Some(orig) = json_str(pin, &["images", "orig", "url"]) else {
                continue;
            };
            let image_url = upgrade_pinimg_url(orig);
            if !seen.insert(image_url.clone()) {
                continue;
            }
            let title = ["grid_title", "title", "description"]
                .iter()
                .find_map(|key| json_str(pin, &[*key]).and_then(|s| text_or_none(s.to_string())))
                .unwrap_or_else(|| fallback_title.clone());
            let source_url = json_str(pin, &["id"])
                .map(|id| format!("https://www.pinterest.com/pin/{id}/"))
                .unwrap_or_else(|| search_url.to_string());
            let thumbnail = json_str(pin, &["images", "236x", "url"])
                .or_else(|| json_str(pin, &["images", "474x", "url"]))
                .unwrap_or(orig);
            let resolution = match (
                json_u64(pin, &["images", "orig", "width"]),
                json_u64(pin, &["images", "orig", "height"]),
            ) {
                (Some(w), Some(h)) => format!("{w}x{h}"),
                _ => "High Resolution".to_string(),
            };

            if let Some(candidate) = Candidate::new(&image_url, category, site, title) {
                out.push(
                    candidate
                        .with_description(description.clone())
                        .with_thumbnail(thumbnail)
                        .with_source_url(source_url)
                        .with_tags([term])
                        .with_resolution(resolution),
                );
            }
        }
    }

    if out.is_empty() {
        let images = selector(r#"img[src*="pinimg.com"]"#)?;
        for img in document.select(&images) {
            if out.len() >= max {
                break;
            }
            let Some(src) = img.value().attr("src").and_then(|s| text_or_none(s.to_string())) else {
                continue;
            };
            let image_url = upgrade_pinimg_url(&src);
            if !seen.insert(image_url.clone()) {
                continue;
            }
            let title = img
                .value()
                .attr("alt")
                .and_then(|s| text_or_none(s.to_string()))
                .unwrap_or_else(|| fallback_title.clone());
            if let Some(candidate) = Candidate::new(&image_url, category, site, title) {
                out.push(
                    candidate
                        .with_description(description.clone())
                        .with_thumbnail(src)
                        .with_source_url(search_url)
                        .with_tags([term]),
                );
            }
        }
    }

    Ok(out)
}

pub struct WallhavenAdapter {
    settings: AdapterSettings,
    fetcher: Arc<dyn Fetch>,
}

impl WallhavenAdapter {
    pub fn new(settings: AdapterSettings, fetcher: Arc<dyn Fetch>) -> Self {
        Self { settings, fetcher }
    }
}

impl PerTermSource for WallhavenAdapter {
    fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    fn term_request(&self, term: &str, _request: &FetchRequest) -> Result<TermRequest, AdapterError> {
        let url = Url::parse_with_params(
            WALLHAVEN_SEARCH,
            &[
                ("q", term),
                ("categories", "111"),
                ("purity", "100"),
                ("sorting", "relevance"),
                ("order", "desc"),
            ],
        )
        .map_err(|e| AdapterError::Message(format!("wallhaven url: {e}")))?;
        Ok(TermRequest {
            url: url.to_string(),
            headers: browser_headers(),
        })
    }

    fn parse(&self, body: &str, term: &str, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        parse_wallhaven_page(
            body,
            &request.category,
            term,
            self.settings.max_per_term,
            &self.settings.display_name,
        )
    }
}

#[async_trait]
impl SourceAdapter for WallhavenAdapter {
    fn source_id(&self) -> &str {
        &self.settings.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError> {
        Ok(fetch_per_term(self, self.fetcher.as_ref(), request).await)
    }
}

/// Extracts the wallpaper id from a `wallhaven.cc/w/<id>` link.
fn wallhaven_id(link: &str) -> Option<&str> {
    const MARKER: &str = "wallhaven.cc/w/";
    let start = link.find(MARKER)? + MARKER.len();
    let rest = &link[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let id = &rest[..end];
    (id.len() >= 2).then_some(id)
}

pub fn parse_wallhaven_page(
    html: &str,
    category: &str,
    term: &str,
    max: usize,
    site: &str,
) -> Result<Vec<Candidate>, AdapterError> {
    let document = Html::parse_document(html);
    let thumbs = selector(".thumb")?;
    let preview = selector("a.preview")?;
    let lazy_img = selector("img[data-src]")?;
    let img = selector("img[src]")?;
    let resolution = selector(".wall-res")?;

    let mut out = Vec::new();
    for thumb in document.select(&thumbs).take(max) {
        let link = thumb
            .value()
            .attr("href")
            .and_then(|s| text_or_none(s.to_string()))
            .or_else(|| select_first_attr(thumb, &preview, "href"));
        let thumbnail = select_first_attr(thumb, &lazy_img, "data-src")
            .or_else(|| select_first_attr(thumb, &img, "src"));
        let (Some(link), Some(thumbnail)) = (link, thumbnail) else {
            continue;
        };
        let Some(id) = wallhaven_id(&link) else {
            continue;
        };

        let image_url = format!("https://w.wallhaven.cc/full/{}/wallhaven-{id}.jpg", &id[..2]);
        let res = select_first_text(thumb, &resolution)
            .map(|r| r.split_whitespace().collect::<String>())
            .unwrap_or_else(|| "High Resolution".to_string());

        if let Some(candidate) = Candidate::new(&image_url, category, site, format!("{term} wallpaper - {id}")) {
            out.push(
                candidate
                    .with_description(Some(format!("High quality {category} wallpaper from {site}")))
                    .with_thumbnail(thumbnail)
                    .with_source_url(link.clone())
                    .with_tags([term, category])
                    .with_resolution(res),
            );
        }
    }
    Ok(out)
}
