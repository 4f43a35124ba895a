//! Source adapter contract and the scrape, API and generator adapters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wpa_core::Candidate;
use wpa_storage::{Fetch, FetchError};

mod api;
mod generator;
mod scrape;

pub use api::{parse_pexels_search, parse_picsum_list, parse_unsplash_search, PexelsAdapter, PicsumAdapter, UnsplashAdapter};
pub use generator::GeneratorAdapter;
pub use scrape::{parse_pinterest_page, parse_wallhaven_page, upgrade_pinimg_url, PinterestAdapter, WallhavenAdapter};

pub const CRATE_NAME: &str = "wpa-adapters";

/// Placeholder value some deployments ship instead of a real key.
const PLACEHOLDER_KEY: &str = "demo-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Scrape,
    Api,
    Generator,
}

/// One adapter invocation: a category, the terms to try in order, and a quota.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub category: String,
    pub terms: Vec<String>,
    pub desired: usize,
    pub page: u32,
    pub cancel: CancellationToken,
}

impl FetchRequest {
    pub fn new(category: impl Into<String>, terms: Vec<String>, desired: usize) -> Self {
        Self {
            category: category.into(),
            terms,
            desired,
            page: 1,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Stops multi-call adapters between calls once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no adapter registered for source {0}")]
    UnknownSource(String),
}

/// Best-effort candidate producer for one external source.
///
/// Per-term failures are logged and skipped inside `fetch`; an `Err` means the
/// adapter could not run at all. Returning fewer than `request.desired`
/// candidates is normal.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// `false` when required credentials are missing; such sources are skipped.
    fn is_configured(&self) -> bool {
        true
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError>;
}

fn default_terms_per_category() -> usize {
    3
}

fn default_max_per_term() -> usize {
    20
}

/// Per-source knobs read from the profile file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterSettings {
    pub source_id: String,
    pub display_name: String,
    pub kind: SourceKind,
    #[serde(default = "default_terms_per_category")]
    pub terms_per_category: usize,
    #[serde(default = "default_max_per_term")]
    pub max_per_term: usize,
    #[serde(default)]
    pub inter_call_delay_ms: u64,
}

impl AdapterSettings {
    pub fn new(source_id: &str, display_name: &str, kind: SourceKind) -> Self {
        Self {
            source_id: source_id.to_string(),
            display_name: display_name.to_string(),
            kind,
            terms_per_category: default_terms_per_category(),
            max_per_term: default_max_per_term(),
            inter_call_delay_ms: 0,
        }
    }

    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }
}

/// API credentials. Blank values and the placeholder key count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub unsplash_access_key: Option<String>,
    pub pexels_api_key: Option<String>,
}

impl Credentials {
    pub fn usable(key: Option<&str>) -> Option<String> {
        key.map(str::trim)
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_KEY)
            .map(ToString::to_string)
    }
}

/// Builds the adapter registered under `settings.source_id`.
pub fn build_adapter(
    settings: &AdapterSettings,
    fetcher: Arc<dyn Fetch>,
    credentials: &Credentials,
) -> Result<Arc<dyn SourceAdapter>, AdapterError> {
    let adapter: Arc<dyn SourceAdapter> = match settings.source_id.as_str() {
        "pinterest" => Arc::new(PinterestAdapter::new(settings.clone(), fetcher)),
        "wallhaven" => Arc::new(WallhavenAdapter::new(settings.clone(), fetcher)),
        "unsplash" => Arc::new(UnsplashAdapter::new(
            settings.clone(),
            fetcher,
            Credentials::usable(credentials.unsplash_access_key.as_deref()),
        )),
        "pexels" => Arc::new(PexelsAdapter::new(
            settings.clone(),
            fetcher,
            Credentials::usable(credentials.pexels_api_key.as_deref()),
        )),
        "picsum" => Arc::new(PicsumAdapter::new(settings.clone(), fetcher)),
        "lorem-picsum" => Arc::new(GeneratorAdapter::new(settings.clone())),
        other => return Err(AdapterError::UnknownSource(other.to_string())),
    };
    Ok(adapter)
}

/// URL and headers for one term's request.
pub(crate) struct TermRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
}

/// Adapters that issue one GET per search term.
pub(crate) trait PerTermSource: Send + Sync {
    fn settings(&self) -> &AdapterSettings;

    fn term_request(&self, term: &str, request: &FetchRequest) -> Result<TermRequest, AdapterError>;

    fn parse(&self, body: &str, term: &str, request: &FetchRequest) -> Result<Vec<Candidate>, AdapterError>;
}

/// Walks the first `terms_per_category` terms, pausing between calls, and
/// returns everything they produced. A failed term is logged and skipped.
///
/// The quota sizes the requests but does not cut the walk short: the
/// orchestrator caps a source by rows saved, and a term full of known images
/// must not stop the next term from being tried.
pub(crate) async fn fetch_per_term<S: PerTermSource>(
    source: &S,
    fetcher: &dyn Fetch,
    request: &FetchRequest,
) -> Vec<Candidate> {
    let settings = source.settings();
    let mut out: Vec<Candidate> = Vec::new();
    if request.desired == 0 {
        return out;
    }

    let terms = request
        .terms
        .iter()
        .take(settings.terms_per_category.max(1))
        .collect::<Vec<_>>();

    for (idx, term) in terms.into_iter().enumerate() {
        if idx > 0 {
            tokio::select! {
                _ = tokio::time::sleep(settings.inter_call_delay()) => {}
                _ = request.cancel.cancelled() => {}
            }
        }
        if request.cancel.is_cancelled() {
            debug!(source_id = %settings.source_id, term = %term, "cancelled before term");
            break;
        }

        let result = match source.term_request(term, request) {
            Ok(req) => {
                let headers = req
                    .headers
                    .iter()
                    .map(|(k, v)| (*k, v.as_str()))
                    .collect::<Vec<_>>();
                match fetcher.get_text(&settings.source_id, &req.url, &headers).await {
                    Ok(body) => source.parse(&body, term, request),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(found) => {
                debug!(source_id = %settings.source_id, term = %term, found = found.len(), "term fetched");
                out.extend(found);
            }
            Err(err) => {
                warn!(source_id = %settings.source_id, term = %term, error = %err, "term failed; continuing");
            }
        }
    }

    info!(
        source_id = %settings.source_id,
        category = %request.category,
        collected = out.len(),
        desired = request.desired,
        "source fetch finished"
    );
    out
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Message(format!("bad selector {css}: {e}")))
}

fn select_first_attr(element: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    element
        .select(sel)
        .filter_map(|n| n.value().attr(attr))
        .find_map(|s| text_or_none(s.to_string()))
}

fn select_first_text(element: ElementRef<'_>, sel: &Selector) -> Option<String> {
    element
        .select(sel)
        .next()
        .and_then(|n| text_or_none(n.text().collect::<String>()))
}

fn json_str<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    cur.as_str()
}

fn json_u64(value: &JsonValue, path: &[&str]) -> Option<u64> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    cur.as_u64()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut s = String::new();
            s.extend(first.to_uppercase());
            s.push_str(chars.as_str());
            s
        }
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use wpa_storage::{Fetch, FetchError};

    /// Replays canned responses in order and records requested URLs.
    #[derive(Default)]
    pub struct ScriptedFetch {
        responses: Mutex<VecDeque<Result<String, FetchError>>>,
        pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedFetch {
        pub fn new(responses: Vec<Result<String, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub async fn urls(&self) -> Vec<String> {
            self.requests.lock().await.iter().map(|(u, _)| u.clone()).collect()
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetch {
        async fn get_text(
            &self,
            _source_id: &str,
            url: &str,
            headers: &[(&str, &str)],
        ) -> Result<String, FetchError> {
            self.requests.lock().await.push((
                url.to_string(),
                headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ));
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::HttpStatus { status: 503, url: url.to_string() }))
        }
    }

    pub fn not_found(url: &str) -> Result<String, FetchError> {
        Err(FetchError::HttpStatus { status: 404, url: url.to_string() })
    }

    pub fn fixture_path(source_id: &str, file: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../fixtures")
            .join(source_id)
            .join("sample")
            .join(file)
    }

    pub fn read_fixture(source_id: &str, file: &str) -> String {
        let path = fixture_path(source_id, file);
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedFetch;
    use super::*;

    #[test]
    fn placeholder_and_blank_keys_are_not_usable() {
        assert_eq!(Credentials::usable(None), None);
        assert_eq!(Credentials::usable(Some("  ")), None);
        assert_eq!(Credentials::usable(Some("demo-key")), None);
        assert_eq!(Credentials::usable(Some(" abc ")), Some("abc".to_string()));
    }

    #[test]
    fn registry_rejects_unknown_sources() {
        let fetcher: Arc<dyn Fetch> = Arc::new(ScriptedFetch::default());
        let settings = AdapterSettings::new("flickr", "Flickr", SourceKind::Api);
        let err = build_adapter(&settings, fetcher.clone(), &Credentials::default())
            .err()
            .expect("unknown source must fail");
        assert!(matches!(err, AdapterError::UnknownSource(ref s) if s == "flickr"));

        let settings = AdapterSettings::new("unsplash", "Unsplash", SourceKind::Api);
        let adapter = build_adapter(&settings, fetcher, &Credentials::default()).unwrap();
        assert!(!adapter.is_configured());
        assert_eq!(adapter.kind(), SourceKind::Api);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: AdapterSettings = serde_json::from_str(
            r#"{"source_id":"wallhaven","display_name":"Wallhaven","kind":"scrape"}"#,
        )
        .unwrap();
        assert_eq!(settings.terms_per_category, 3);
        assert_eq!(settings.max_per_term, 20);
        assert_eq!(settings.inter_call_delay(), Duration::ZERO);
    }

    #[test]
    fn capitalize_handles_empty_and_ascii() {
        assert_eq!(capitalize("sunset"), "Sunset");
        assert_eq!(capitalize(""), "");
    }
}
