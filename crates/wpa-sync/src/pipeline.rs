use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;
use wpa_adapters::{AdapterError, FetchRequest, SourceAdapter};
use wpa_core::search_terms;
use wpa_storage::{CatalogStore, StoreError};

use crate::catalog::{CountReconciler, DedupGate, GateError};
use crate::config::{ConfigError, Profile};
use crate::quota::{allocate, QuotaShare, SourceQuota};
use crate::reports::write_run_reports;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("run setup failed: {0}")]
    Setup(#[source] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("run task ended without a result")]
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running { category: String, source_index: usize },
    Completed,
    Cancelled,
}

impl RunState {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceTally {
    pub source_id: String,
    pub quota: usize,
    pub found: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub failed_saves: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub category: String,
    pub target: usize,
    pub sources: Vec<SourceTally>,
}

impl CategoryTally {
    pub fn saved(&self) -> usize {
        self.sources.iter().map(|s| s.saved).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub profile: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub skipped_sources: Vec<String>,
    pub categories: Vec<CategoryTally>,
    pub total_found: usize,
    pub total_saved: usize,
    pub total_duplicates: usize,
    pub total_failed_saves: usize,
    pub reconciled: bool,
    pub reports_dir: Option<String>,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        let verb = match self.status {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
        };
        format!(
            "{} run {verb}: saved {} new wallpapers ({} found, {} duplicates, {} failed saves)",
            self.profile, self.total_saved, self.total_found, self.total_duplicates, self.total_failed_saves
        )
    }

    pub fn source_totals(&self) -> Vec<SourceTally> {
        let mut order = Vec::new();
        let mut totals: HashMap<&str, SourceTally> = HashMap::new();
        for tally in self.categories.iter().flat_map(|c| &c.sources) {
            let entry = totals.entry(tally.source_id.as_str()).or_insert_with(|| {
                order.push(tally.source_id.clone());
                SourceTally {
                    source_id: tally.source_id.clone(),
                    ..Default::default()
                }
            });
            entry.quota += tally.quota;
            entry.found += tally.found;
            entry.saved += tally.saved;
            entry.duplicates += tally.duplicates;
            entry.failed_saves += tally.failed_saves;
        }
        order
            .iter()
            .filter_map(|id| totals.remove(id.as_str()))
            .collect()
    }
}

pub type RunOutcome = Result<Arc<IngestReport>, Arc<IngestError>>;

/// Observer for a spawned run. Cloning is cheap; all clones see the same run.
#[derive(Clone)]
pub struct RunHandle {
    run_id: Uuid,
    profile: String,
    state: watch::Receiver<RunState>,
    outcome: watch::Receiver<Option<RunOutcome>>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(&self) -> RunOutcome {
        let mut rx = self.outcome.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone().unwrap_or_else(|| Err(Arc::new(IngestError::Aborted)));
            }
        }
    }

    /// `None` when the run is still going after `limit`.
    pub async fn wait_for(&self, limit: Duration) -> Option<RunOutcome> {
        tokio::time::timeout(limit, self.wait()).await.ok()
    }
}

/// One profile's worth of ingestion over a shared catalog store.
pub struct IngestPipeline {
    profile: Profile,
    categories: Vec<String>,
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
    store: Arc<dyn CatalogStore>,
    reports_dir: Option<PathBuf>,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
}

impl IngestPipeline {
    pub fn new(profile: Profile, categories: Vec<String>, store: Arc<dyn CatalogStore>) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            profile,
            categories,
            adapters: HashMap::new(),
            store,
            reports_dir: None,
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.source_id().to_string(), adapter);
        self
    }

    pub fn with_reports_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.reports_dir = dir;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub async fn run_once(&self) -> Result<IngestReport, IngestError> {
        self.run(Uuid::new_v4()).await
    }

    /// Runs in a background task; the handle observes state and result.
    pub fn spawn(self) -> RunHandle {
        let run_id = Uuid::new_v4();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let handle = RunHandle {
            run_id,
            profile: self.profile.name.clone(),
            state: self.state.subscribe(),
            outcome: outcome_rx,
            cancel: self.cancel.clone(),
        };
        tokio::spawn(async move {
            let result = self.run(run_id).await;
            if let Err(err) = &result {
                warn!(%run_id, error = %err, "ingestion run failed");
            }
            outcome_tx.send_replace(Some(result.map(Arc::new).map_err(Arc::new)));
        });
        handle
    }

    fn quotas(&self) -> (Vec<SourceQuota>, Vec<String>) {
        let shares = self
            .profile
            .sources
            .iter()
            .map(|s| QuotaShare {
                source_id: s.source_id.as_str(),
                weight: s.weight,
                enabled: self
                    .adapters
                    .get(&s.source_id)
                    .is_some_and(|a| a.is_configured()),
            })
            .collect::<Vec<_>>();
        let skipped = shares
            .iter()
            .filter(|s| !s.enabled)
            .map(|s| s.source_id.to_string())
            .collect();
        (
            allocate(self.profile.target_per_category, &shares, self.profile.disabled_share),
            skipped,
        )
    }

    async fn run(&self, run_id: Uuid) -> Result<IngestReport, IngestError> {
        let span = info_span!("ingest_run", %run_id, profile = %self.profile.name);
        async move {
            let started_at = Utc::now();
            self.store.ping().await.map_err(IngestError::Setup)?;

            let gate = DedupGate::new(self.store.clone());
            let (quotas, skipped_sources) = self.quotas();
            for id in &skipped_sources {
                info!(source_id = %id, "source not configured; its share is skipped");
            }

            let mut categories = Vec::with_capacity(self.categories.len());
            let mut cancelled = false;

            for (idx, category) in self.categories.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let terms = search_terms(category).into_iter().map(str::to_string).collect::<Vec<_>>();
                let mut tally = CategoryTally {
                    category: category.clone(),
                    target: self.profile.target_per_category,
                    sources: Vec::with_capacity(quotas.len()),
                };

                for (source_index, quota) in quotas.iter().enumerate() {
                    if self.cancel.is_cancelled() {
                        cancelled = true;
                        break;
                    }
                    self.state.send_replace(RunState::Running {
                        category: category.clone(),
                        source_index,
                    });
                    let Some(adapter) = self.adapters.get(&quota.source_id) else {
                        continue;
                    };
                    // page hint is the category ordinal so paged sources spread across categories
                    let request = FetchRequest::new(category.clone(), terms.clone(), quota.quota)
                        .with_page(idx as u32 + 1)
                        .with_cancellation(self.cancel.clone());
                    tally
                        .sources
                        .push(self.run_source(&gate, adapter.as_ref(), &request).await);
                }

                info!(category = %category, saved = tally.saved(), "category finished");
                categories.push(tally);

                if cancelled || idx + 1 == self.categories.len() {
                    continue;
                }
                let delay = self.profile.inter_category_delay();
                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {}
                    }
                }
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
            }

            let reconciled = match CountReconciler::new(self.store.clone()).reconcile().await {
                Ok(_) => true,
                Err(err) => {
                    warn!(error = %err, "category count reconciliation failed");
                    false
                }
            };

            let sources = categories.iter().flat_map(|c| &c.sources);
            let mut report = IngestReport {
                run_id,
                profile: self.profile.name.clone(),
                status: if cancelled { RunStatus::Cancelled } else { RunStatus::Completed },
                started_at,
                finished_at: Utc::now(),
                skipped_sources,
                total_found: sources.clone().map(|s| s.found).sum(),
                total_saved: sources.clone().map(|s| s.saved).sum(),
                total_duplicates: sources.clone().map(|s| s.duplicates).sum(),
                total_failed_saves: sources.map(|s| s.failed_saves).sum(),
                categories,
                reconciled,
                reports_dir: None,
            };

            if let Some(root) = &self.reports_dir {
                match write_run_reports(root, &report).await {
                    Ok(dir) => report.reports_dir = Some(dir.display().to_string()),
                    Err(err) => warn!(error = %err, "writing run reports failed"),
                }
            }

            self.state.send_replace(if cancelled { RunState::Cancelled } else { RunState::Completed });
            info!(summary = %report.summary(), "ingestion run finished");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run_source(&self, gate: &DedupGate, adapter: &dyn SourceAdapter, request: &FetchRequest) -> SourceTally {
        let mut tally = SourceTally {
            source_id: adapter.source_id().to_string(),
            quota: request.desired,
            ..Default::default()
        };
        if request.desired == 0 {
            return tally;
        }

        let span = info_span!("source", category = %request.category, source_id = %tally.source_id);
        let candidates = match adapter.fetch(request).instrument(span).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(source_id = %tally.source_id, category = %request.category, error = %err, "source failed");
                tally.error = Some(err.to_string());
                Vec::new()
            }
        };
        tally.found = candidates.len();

        // the quota caps new rows; duplicates do not use it up
        for candidate in &candidates {
            if tally.saved >= request.desired {
                break;
            }
            match gate.save_if_new(candidate).await {
                Ok(true) => tally.saved += 1,
                Ok(false) => tally.duplicates += 1,
                Err(GateError::MissingIdentity) => {
                    warn!(source_id = %tally.source_id, "candidate without identity");
                    tally.failed_saves += 1;
                }
                Err(GateError::Store(err)) => {
                    warn!(source_id = %tally.source_id, image_url = %candidate.image_url, error = %err, "save failed");
                    tally.failed_saves += 1;
                }
            }
        }
        tally
    }
}
