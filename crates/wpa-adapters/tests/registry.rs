use std::sync::Arc;

use async_trait::async_trait;
use wpa_adapters::{build_adapter, AdapterSettings, Credentials, FetchRequest, SourceKind};
use wpa_storage::{Fetch, FetchError};

struct OfflineFetch;

#[async_trait]
impl Fetch for OfflineFetch {
    async fn get_text(&self, _source_id: &str, url: &str, _headers: &[(&str, &str)]) -> Result<String, FetchError> {
        Err(FetchError::HttpStatus {
            status: 503,
            url: url.to_string(),
        })
    }
}

#[test]
fn every_source_has_fixtures() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    for (source, file) in [
        ("pinterest", "search.html"),
        ("wallhaven", "search.html"),
        ("unsplash", "search.json"),
        ("pexels", "search.json"),
        ("picsum", "list.json"),
    ] {
        assert!(root.join("fixtures").join(source).join("sample").join(file).exists(), "{source}");
    }
}

#[tokio::test]
async fn registry_builds_all_sources_and_offline_fetches_are_empty() {
    let fetcher: Arc<dyn Fetch> = Arc::new(OfflineFetch);
    let credentials = Credentials {
        unsplash_access_key: Some("demo-key".into()),
        pexels_api_key: Some("real".into()),
    };
    let request = FetchRequest::new("space", vec!["galaxy".into()], 4);

    for (id, kind) in [
        ("pinterest", SourceKind::Scrape),
        ("wallhaven", SourceKind::Scrape),
        ("unsplash", SourceKind::Api),
        ("pexels", SourceKind::Api),
        ("picsum", SourceKind::Api),
    ] {
        let adapter = build_adapter(&AdapterSettings::new(id, id, kind), fetcher.clone(), &credentials).unwrap();
        assert_eq!(adapter.source_id(), id);
        assert_eq!(adapter.is_configured(), id != "unsplash", "{id}");
        assert!(adapter.fetch(&request).await.unwrap().is_empty(), "{id}");
    }

    let generator = build_adapter(
        &AdapterSettings::new("lorem-picsum", "Lorem Picsum", SourceKind::Generator),
        fetcher,
        &credentials,
    )
    .unwrap();
    assert_eq!(generator.fetch(&request).await.unwrap().len(), 4);
}
