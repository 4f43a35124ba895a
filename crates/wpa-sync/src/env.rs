use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use wpa_adapters::build_adapter;
use wpa_storage::{CatalogStore, Fetch, HttpFetcher};

use crate::config::{ConfigError, IngestConfig, ProfileRegistry};
use crate::pipeline::{IngestError, IngestPipeline};

pub const SCHEDULED_PROFILE: &str = "regular";

/// Everything needed to build a pipeline for any profile: config, the
/// profile registry, one shared store and one shared fetcher.
#[derive(Clone)]
pub struct IngestEnvironment {
    config: IngestConfig,
    registry: ProfileRegistry,
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn Fetch>,
}

impl IngestEnvironment {
    pub fn new(
        config: IngestConfig,
        registry: ProfileRegistry,
        store: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            fetcher,
        }
    }

    /// Loads the profile registry and builds the HTTP fetcher from `config`.
    pub fn from_config(config: IngestConfig, store: Arc<dyn CatalogStore>) -> Result<Self> {
        let registry = ProfileRegistry::load(&config.profiles_path)
            .with_context(|| format!("loading profiles from {}", config.profiles_path.display()))?;
        let fetcher = HttpFetcher::new(config.http_client_config())?;
        Ok(Self::new(config, registry, store, Arc::new(fetcher)))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn store(&self) -> Arc<dyn CatalogStore> {
        self.store.clone()
    }

    pub fn pipeline(&self, profile_name: &str) -> Result<IngestPipeline, IngestError> {
        let profile = self.registry.profile(profile_name)?.clone();
        let mut pipeline = IngestPipeline::new(profile.clone(), self.registry.categories.clone(), self.store.clone())
            .with_reports_dir(self.config.reports_dir.clone());
        for weighted in &profile.sources {
            let settings = self
                .registry
                .source(&weighted.source_id)
                .ok_or_else(|| ConfigError::UnknownSource {
                    profile: profile.name.clone(),
                    source_id: weighted.source_id.clone(),
                })?;
            let adapter = build_adapter(settings, self.fetcher.clone(), &self.config.credentials)?;
            pipeline = pipeline.with_adapter(adapter);
        }
        Ok(pipeline)
    }

    /// Cron job running the `regular` profile; `None` unless enabled.
    pub async fn maybe_build_scheduler(&self) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }
        // fail at startup, not at 02:00
        self.pipeline(SCHEDULED_PROFILE)?;

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        let cron = self.config.scrape_cron.clone();
        let env = self.clone();
        let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
            let env = env.clone();
            Box::pin(async move {
                info!(profile = SCHEDULED_PROFILE, "scheduled ingestion triggered");
                match env.pipeline(SCHEDULED_PROFILE) {
                    Ok(pipeline) => match pipeline.run_once().await {
                        Ok(report) => info!(summary = %report.summary(), "scheduled ingestion finished"),
                        Err(err) => warn!(error = %err, "scheduled ingestion failed"),
                    },
                    Err(err) => warn!(error = %err, "building scheduled pipeline failed"),
                }
            })
        })
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
        sched.add(job).await.context("adding scheduler job")?;
        Ok(Some(sched))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use wpa_adapters::Credentials;
    use wpa_storage::{FetchError, MemoryCatalogStore};

    use super::*;

    struct NoNetwork;

    #[async_trait::async_trait]
    impl Fetch for NoNetwork {
        async fn get_text(&self, _source_id: &str, url: &str, _headers: &[(&str, &str)]) -> Result<String, FetchError> {
            Err(FetchError::HttpStatus {
                status: 503,
                url: url.to_string(),
            })
        }
    }

    fn config() -> IngestConfig {
        IngestConfig {
            database_url: String::new(),
            profiles_path: PathBuf::from("ingest.yaml"),
            reports_dir: None,
            user_agent: "test".to_string(),
            http_timeout_secs: 1,
            scheduler_enabled: false,
            scrape_cron: "0 0 2 * * *".to_string(),
            web_port: 0,
            credentials: Credentials::default(),
        }
    }

    fn env(store: Arc<MemoryCatalogStore>) -> IngestEnvironment {
        IngestEnvironment::new(config(), ProfileRegistry::builtin(), store, Arc::new(NoNetwork))
    }

    #[tokio::test]
    async fn populate_profile_runs_every_category_without_network() {
        let store = Arc::new(MemoryCatalogStore::new());
        let report = env(store.clone()).pipeline("populate").unwrap().run_once().await.unwrap();
        assert_eq!(report.total_found, 8 * 150);
        assert_eq!(report.total_saved + report.total_duplicates, 8 * 150);
        assert_eq!(report.total_saved, store.len().await);
        let counted: i64 = store.categories().await.unwrap().iter().map(|c| c.wallpaper_count).sum();
        assert_eq!(counted as usize, store.len().await);
    }

    #[tokio::test]
    async fn unknown_profile_is_a_config_error() {
        let store = Arc::new(MemoryCatalogStore::new());
        assert!(matches!(
            env(store).pipeline("hourly"),
            Err(IngestError::Config(ConfigError::UnknownProfile(_)))
        ));
    }

    #[tokio::test]
    async fn scheduler_is_off_unless_enabled() {
        let store = Arc::new(MemoryCatalogStore::new());
        assert!(env(store).maybe_build_scheduler().await.unwrap().is_none());
    }
}
