use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use wpa_storage::PgCatalogStore;
use wpa_sync::{CountReconciler, IngestConfig};

#[derive(Debug, Parser)]
#[command(name = "wpa-cli")]
#[command(about = "Wallpaper catalog ingestion command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one ingestion profile to completion.
    Ingest {
        #[arg(long, default_value = "regular")]
        profile: String,
    },
    /// Recompute every category's wallpaper count.
    Reconcile,
    Migrate,
    /// Serve the JSON API; the cron trigger starts when WPA_SCHEDULER_ENABLED is set.
    Serve,
}

async fn connect(config: &IngestConfig) -> Result<PgCatalogStore> {
    PgCatalogStore::connect(&config.database_url)
        .await
        .context("connecting catalog store")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();

    match cli.command.unwrap_or(Commands::Ingest {
        profile: "regular".to_string(),
    }) {
        Commands::Ingest { profile } => {
            let store = connect(&config).await?;
            let report = wpa_sync::run_profile_from_env(&profile, Arc::new(store.clone())).await;
            store.close().await;
            let report = report?;
            println!("{} run_id={}", report.summary(), report.run_id);
            if let Some(dir) = &report.reports_dir {
                println!("reports: {dir}");
            }
        }
        Commands::Reconcile => {
            let store = connect(&config).await?;
            let updated = CountReconciler::new(Arc::new(store.clone())).reconcile().await;
            store.close().await;
            println!("reconciled {} categories", updated?);
        }
        Commands::Migrate => {
            let store = connect(&config).await?;
            let migrated = store.migrate().await;
            store.close().await;
            migrated?;
            info!("migrations complete");
        }
        Commands::Serve => wpa_web::serve_from_env().await?,
    }

    Ok(())
}
