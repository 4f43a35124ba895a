//! Ingestion orchestration: profiles, quotas, the dedup gate, run reports and
//! the cron trigger.

mod catalog;
mod config;
mod env;
mod pipeline;
mod quota;
mod reports;

pub use catalog::{CountReconciler, DedupGate, GateError};
pub use config::{ConfigError, IngestConfig, Profile, ProfileRegistry, WeightedSource};
pub use env::{IngestEnvironment, SCHEDULED_PROFILE};
pub use pipeline::{
    CategoryTally, IngestError, IngestPipeline, IngestReport, RunHandle, RunOutcome, RunState,
    RunStatus, SourceTally,
};
pub use quota::{allocate, DisabledSharePolicy, QuotaShare, SourceQuota};
pub use reports::{render_brief, write_run_reports, ReportManifest, ReportManifestFile};

pub const CRATE_NAME: &str = "wpa-sync";

/// Builds the environment from process env and runs one profile.
pub async fn run_profile_from_env(
    profile: &str,
    store: std::sync::Arc<dyn wpa_storage::CatalogStore>,
) -> anyhow::Result<IngestReport> {
    let env = IngestEnvironment::from_config(IngestConfig::from_env(), store)?;
    Ok(env.pipeline(profile)?.run_once().await?)
}
