//! JSON API over the wallpaper catalog: browsing, counters and ingestion
//! triggers with pollable run status.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use wpa_core::Wallpaper;
use wpa_storage::{CatalogStore, Counter, PgCatalogStore, StoreError, WallpaperQuery};
use wpa_sync::{IngestConfig, IngestEnvironment, RunHandle};

pub const CRATE_NAME: &str = "wpa-web";

pub const DEFAULT_WAIT_SECS: u64 = 30;
pub const MAX_WAIT_SECS: u64 = 300;
/// Triggered runs kept for status polling.
pub const RUN_HISTORY: usize = 32;

#[derive(Clone)]
pub struct AppState {
    env: IngestEnvironment,
    runs: RunRegistry,
}

impl AppState {
    pub fn new(env: IngestEnvironment) -> Self {
        Self {
            env,
            runs: RunRegistry::new(RUN_HISTORY),
        }
    }

    pub fn with_run_history(mut self, capacity: usize) -> Self {
        self.runs = RunRegistry::new(capacity);
        self
    }
}

/// Bounded map of triggered runs. Past capacity the oldest finished run is
/// evicted, or the oldest run when none has finished.
#[derive(Clone)]
pub struct RunRegistry {
    capacity: usize,
    inner: Arc<RwLock<RunLog>>,
}

#[derive(Default)]
struct RunLog {
    order: VecDeque<Uuid>,
    handles: HashMap<Uuid, RunHandle>,
}

impl RunRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(RwLock::new(RunLog::default())),
        }
    }

    pub async fn insert(&self, handle: RunHandle) {
        let mut guard = self.inner.write().await;
        let log = &mut *guard;
        log.order.push_back(handle.run_id());
        log.handles.insert(handle.run_id(), handle);

        while log.handles.len() > self.capacity {
            let pos = log
                .order
                .iter()
                .position(|id| log.handles.get(id).is_some_and(|h| h.outcome().is_some()))
                .unwrap_or(0);
            let Some(evicted) = log.order.remove(pos) else {
                break;
            };
            log.handles.remove(&evicted);
        }
    }

    pub async fn get(&self, run_id: &Uuid) -> Option<RunHandle> {
        self.inner.read().await.handles.get(run_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.handles.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Trigger {
    profile: &'static str,
    label: &'static str,
}

const RUN: Trigger = Trigger { profile: "regular", label: "Scraper" };
const BULK: Trigger = Trigger { profile: "bulk", label: "Bulk scraper" };
const POPULATE: Trigger = Trigger { profile: "populate", label: "Populate run" };
const WORKING: Trigger = Trigger { profile: "working", label: "Working scraper" };

#[derive(Debug, Deserialize, Default)]
struct TriggerQuery {
    wait_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    category: Option<String>,
    search: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: u32,
    limit: u32,
    total: i64,
    total_pages: i64,
}

#[derive(Debug, Serialize)]
struct WallpaperList {
    wallpapers: Vec<Wallpaper>,
    pagination: Pagination,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/scraper/run", post(run_handler))
        .route("/api/scraper/bulk", post(bulk_handler))
        .route("/api/scraper/populate", post(populate_handler))
        .route("/api/scraper/working", post(working_handler))
        .route("/api/scraper/runs/{run_id}", get(run_status_handler))
        .route("/api/wallpapers", get(list_handler))
        .route("/api/wallpapers/categories/all", get(categories_handler))
        .route("/api/wallpapers/{id}", get(wallpaper_handler))
        .route("/api/wallpapers/{id}/download", post(download_handler))
        .route("/api/wallpapers/{id}/like", post(like_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!(port, "wallpaper api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Connects the catalog, starts the cron scheduler when enabled and serves
/// the API until the process exits.
pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = IngestConfig::from_env();
    let port = config.web_port;
    let store = PgCatalogStore::connect(&config.database_url)
        .await
        .context("connecting catalog store")?;
    let env = IngestEnvironment::from_config(config, Arc::new(store))?;

    let scheduler = env.maybe_build_scheduler().await?;
    if let Some(sched) = &scheduler {
        sched.start().await.context("starting scheduler")?;
        info!(cron = %env.config().scrape_cron, "ingestion scheduler started");
    }
    serve(AppState::new(env), port).await
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "message": "Wallpaper Aggregator API is running",
    }))
}

async fn run_handler(State(state): State<AppState>, Query(query): Query<TriggerQuery>) -> Response {
    trigger(state, query, RUN).await
}

async fn bulk_handler(State(state): State<AppState>, Query(query): Query<TriggerQuery>) -> Response {
    trigger(state, query, BULK).await
}

async fn populate_handler(State(state): State<AppState>, Query(query): Query<TriggerQuery>) -> Response {
    trigger(state, query, POPULATE).await
}

async fn working_handler(State(state): State<AppState>, Query(query): Query<TriggerQuery>) -> Response {
    trigger(state, query, WORKING).await
}

/// Spawns the profile's run and waits up to `wait_secs` for it; slower runs
/// answer 202 and keep going in the background.
async fn trigger(state: AppState, query: TriggerQuery, trigger: Trigger) -> Response {
    let pipeline = match state.env.pipeline(trigger.profile) {
        Ok(pipeline) => pipeline,
        Err(err) => return run_failed(trigger, &err.to_string()),
    };
    info!(profile = trigger.profile, "ingestion run triggered");
    let handle = pipeline.spawn();
    let run_id = handle.run_id();
    state.runs.insert(handle.clone()).await;

    let wait = Duration::from_secs(query.wait_secs.unwrap_or(DEFAULT_WAIT_SECS).min(MAX_WAIT_SECS));
    match handle.wait_for(wait).await {
        Some(Ok(report)) => Json(json!({
            "success": true,
            "savedCount": report.total_saved,
            "message": format!("{} finished. {}", trigger.label, report.summary()),
            "runId": run_id,
        }))
        .into_response(),
        Some(Err(err)) => run_failed(trigger, &err.to_string()),
        None => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "runId": run_id,
                "message": format!("{} still running; poll /api/scraper/runs/{run_id}", trigger.label),
            })),
        )
            .into_response(),
    }
}

fn run_failed(trigger: Trigger, error: &str) -> Response {
    warn!(profile = trigger.profile, error, "ingestion run failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": format!("{} failed", trigger.label),
            "error": error,
        })),
    )
        .into_response()
}

async fn run_status_handler(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Response {
    let Some(handle) = state.runs.get(&run_id).await else {
        return not_found("Run not found");
    };
    let (report, error) = match handle.outcome() {
        Some(Ok(report)) => (serde_json::to_value(report.as_ref()).ok(), None),
        Some(Err(err)) => (None, Some(err.to_string())),
        None => (None, None),
    };
    Json(json!({
        "runId": run_id,
        "profile": handle.profile(),
        "state": handle.state(),
        "finished": handle.outcome().is_some(),
        "report": report,
        "error": error,
    }))
    .into_response()
}

async fn list_handler(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let query = WallpaperQuery::from_params(
        query.page,
        query.limit,
        query.category,
        query.search,
        query.sort_by.as_deref(),
        query.sort_order.as_deref(),
    );
    match state.env.store().list_wallpapers(&query).await {
        Ok(page) => Json(WallpaperList {
            pagination: Pagination {
                page: page.page,
                limit: page.limit,
                total: page.total,
                total_pages: page.total_pages,
            },
            wallpapers: page.wallpapers,
        })
        .into_response(),
        Err(err) => server_error(err),
    }
}

async fn wallpaper_handler(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.env.store().wallpaper(id).await {
        Ok(Some(wallpaper)) => Json(wallpaper).into_response(),
        Ok(None) => not_found("Wallpaper not found"),
        Err(err) => server_error(err),
    }
}

async fn categories_handler(State(state): State<AppState>) -> Response {
    match state.env.store().categories().await {
        Ok(categories) => Json(categories).into_response(),
        Err(err) => server_error(err),
    }
}

async fn download_handler(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    bump(&state, id, Counter::Downloads, "downloads").await
}

async fn like_handler(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    bump(&state, id, Counter::Likes, "likes").await
}

async fn bump(state: &AppState, id: i64, counter: Counter, field: &str) -> Response {
    match state.env.store().increment(id, counter).await {
        Ok(Some(value)) => Json(json!({ "success": true, (field): value })).into_response(),
        Ok(None) => not_found("Wallpaper not found"),
        Err(err) => server_error(err),
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

fn server_error(err: StoreError) -> Response {
    warn!(error = %err, "catalog request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
