use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::pipeline::IngestReport;

#[derive(Debug, Clone, Serialize)]
pub struct ReportManifest {
    pub schema_version: u32,
    pub files: Vec<ReportManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Writes `<root>/<run_id>/` with the markdown brief, the JSON report, a
/// parquet snapshot of per-source tallies and a checksum manifest.
pub async fn write_run_reports(root: &Path, report: &IngestReport) -> Result<PathBuf> {
    let reports_dir = root.join(report.run_id.to_string());
    let snapshot_dir = reports_dir.join("snapshots");
    fs::create_dir_all(&snapshot_dir)
        .await
        .with_context(|| format!("creating {}", snapshot_dir.display()))?;

    let brief_path = reports_dir.join("ingest_brief.md");
    fs::write(&brief_path, render_brief(report))
        .await
        .context("writing ingest_brief.md")?;

    let json_path = reports_dir.join("run_report.json");
    let json = serde_json::to_vec_pretty(report).context("serializing run report")?;
    fs::write(&json_path, json).await.context("writing run_report.json")?;

    let tallies_path = snapshot_dir.join("source_tallies.parquet");
    write_tallies_parquet(&tallies_path, report)?;

    let manifest = ReportManifest {
        schema_version: 1,
        files: vec![
            manifest_entry("ingest_brief", &reports_dir, &brief_path)?,
            manifest_entry("run_report", &reports_dir, &json_path)?,
            manifest_entry("source_tallies", &reports_dir, &tallies_path)?,
        ],
    };
    let manifest_path = snapshot_dir.join("manifest.json");
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing report manifest")?;
    fs::write(&manifest_path, bytes)
        .await
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    Ok(reports_dir)
}

pub fn render_brief(report: &IngestReport) -> String {
    let categories = report
        .categories
        .iter()
        .map(|c| format!("- {}: {} saved of {} targeted", c.category, c.saved(), c.target))
        .collect::<Vec<_>>()
        .join("\n");
    let sources = report
        .source_totals()
        .iter()
        .map(|s| {
            format!(
                "| {} | {} | {} | {} | {} |",
                s.source_id, s.found, s.saved, s.duplicates, s.failed_saves
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let skipped = if report.skipped_sources.is_empty() {
        "none".to_string()
    } else {
        report.skipped_sources.join(", ")
    };

    format!(
        "# Wallpaper Ingest Brief\n\n- Run ID: `{}`\n- Profile: {}\n- Status: {:?}\n- Started: {}\n- Finished: {}\n- Saved: {}\n- Duplicates: {}\n- Failed saves: {}\n- Skipped sources: {}\n- Counts reconciled: {}\n\n## Categories\n{}\n\n## Sources\n| source | found | saved | duplicates | failed |\n|---|---|---|---|---|\n{}\n",
        report.run_id,
        report.profile,
        report.status,
        report.started_at,
        report.finished_at,
        report.total_saved,
        report.total_duplicates,
        report.total_failed_saves,
        skipped,
        report.reconciled,
        categories,
        sources,
    )
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn write_tallies_parquet(path: &Path, report: &IngestReport) -> Result<()> {
    let rows = report
        .categories
        .iter()
        .flat_map(|c| c.sources.iter().map(move |s| (c.category.as_str(), s)))
        .collect::<Vec<_>>();

    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("category", DataType::Utf8, false),
        ArrowField::new("source_id", DataType::Utf8, false),
        ArrowField::new("quota", DataType::UInt64, false),
        ArrowField::new("found", DataType::UInt64, false),
        ArrowField::new("saved", DataType::UInt64, false),
        ArrowField::new("duplicates", DataType::UInt64, false),
        ArrowField::new("failed_saves", DataType::UInt64, false),
        ArrowField::new("error", DataType::Utf8, true),
    ]));

    let count = |f: fn(&crate::pipeline::SourceTally) -> usize| {
        UInt64Array::from(rows.iter().map(|(_, s)| f(s) as u64).collect::<Vec<_>>())
    };
    let categories = StringArray::from(rows.iter().map(|(c, _)| Some(*c)).collect::<Vec<_>>());
    let source_ids = StringArray::from(
        rows.iter()
            .map(|(_, s)| Some(s.source_id.as_str()))
            .collect::<Vec<_>>(),
    );
    let errors = StringArray::from(rows.iter().map(|(_, s)| s.error.as_deref()).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(categories),
            Arc::new(source_ids),
            Arc::new(count(|s| s.quota)),
            Arc::new(count(|s| s.found)),
            Arc::new(count(|s| s.saved)),
            Arc::new(count(|s| s.duplicates)),
            Arc::new(count(|s| s.failed_saves)),
            Arc::new(errors),
        ],
    )
    .context("building source tallies record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path) -> Result<ReportManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = hex::encode(hasher.finalize());
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ReportManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
    })
}
