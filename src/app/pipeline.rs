// CleanLog - app/pipeline.rs
//
// End-to-end runs of each analysis module. Both the dashboard handlers and
// the CLI subcommands go through these functions.
//
// Error policy:
//   - Per-file failures are non-fatal; they are logged and returned as warnings.
//   - An empty result still produces the module's empty report.
//   - Only single-source modules (chat) return an error to the caller.

use crate::core::chat;
use crate::core::export::{self, ArtifactKind};
use crate::core::dedup::{self, DedupConfig};
use crate::core::ledger::{LedgerSource, Reconciler, ReconciliationRun};
use crate::core::log_analyzer;
use crate::core::model::TimeUnit;
use crate::core::report::StandardReport;
use crate::platform::config::AppConfig;
use crate::platform::fs;
use crate::util::error::{ExportError, IngestError};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Report plus the non-fatal warnings collected on the way.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: StandardReport,
    pub warnings: Vec<String>,
}

/// Dedup settings taken from the loaded configuration.
pub fn dedup_config(config: &AppConfig) -> DedupConfig {
    DedupConfig {
        max_depth: config.max_depth,
        exclude_patterns: config.exclude_patterns.clone(),
    }
}

/// Matching tolerances taken from the loaded configuration.
pub fn reconciler(config: &AppConfig) -> Reconciler {
    Reconciler {
        amount_tolerance: config.amount_tolerance,
        time_window_minutes: config.time_window_minutes,
        name_similarity_threshold: config.name_similarity_threshold,
    }
}

/// Timestamp unit for chat databases; config validation already rejected
/// unknown names, so anything unparseable means seconds.
pub fn chat_time_unit(config: &AppConfig) -> TimeUnit {
    TimeUnit::parse(&config.chat_time_unit).unwrap_or_default()
}

/// Scan `roots`, fingerprint every file, and report duplicates.
pub fn run_file_cleaner(roots: &[PathBuf], config: &AppConfig) -> PipelineOutput {
    let started = Instant::now();
    tracing::info!(roots = roots.len(), "Dedup scan started");

    let (mut records, mut warnings) = dedup::scan_and_index(roots, &dedup_config(config));
    warnings.extend(dedup::calculate_hashes(&mut records));
    let report = dedup::analyze(&records);

    tracing::info!(
        files = records.len(),
        warnings = warnings.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Dedup scan completed"
    );
    PipelineOutput { report, warnings }
}

/// Analyse a chat database or bill export on the local filesystem.
pub fn run_chat_analyzer(path: &Path, time_unit: TimeUnit) -> Result<StandardReport, IngestError> {
    let messages = chat::load_chat_path(path, time_unit)?;
    tracing::info!(file = %path.display(), messages = messages.len(), "Chat source loaded");
    Ok(chat::analyze(&messages))
}

/// Analyse an uploaded bill export.
pub fn run_chat_analyzer_bytes(bytes: &[u8], file_name: &str) -> Result<StandardReport, IngestError> {
    let messages = chat::load_chat_bytes(bytes, file_name)?;
    tracing::info!(file = file_name, messages = messages.len(), "Chat upload loaded");
    Ok(chat::analyze(&messages))
}

/// Reconcile bill files on disk. Missing or unreadable files are skipped
/// and reported in `skipped`.
pub fn run_finance_etl(paths: &[PathBuf], config: &AppConfig) -> ReconciliationRun {
    let mut sources = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Bill file not found, skipping");
            unreadable.push(format!("{}: file not found", path.display()));
            continue;
        }
        match fs::read_source(path) {
            Ok(bytes) => sources.push(LedgerSource { name, bytes }),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read bill file, skipping");
                unreadable.push(e.to_string());
            }
        }
    }

    let mut run = run_finance_etl_sources(&sources, config);
    unreadable.append(&mut run.skipped);
    run.skipped = unreadable;
    run
}

/// Reconcile uploaded bill files.
pub fn run_finance_etl_sources(sources: &[LedgerSource], config: &AppConfig) -> ReconciliationRun {
    let started = Instant::now();
    let run = reconciler(config).run(sources);
    tracing::info!(
        files = sources.len(),
        skipped = run.skipped.len(),
        transactions = run.outcome.total(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Reconciliation completed"
    );
    run
}

/// Classify pasted log text.
pub fn run_log_analyzer(text: &str) -> StandardReport {
    let analysis = log_analyzer::analyze(text);
    tracing::info!(
        lines = analysis.total_lines,
        anomalies = analysis.anomalies.len(),
        "Log analysis completed"
    );
    log_analyzer::report(&analysis)
}

/// Write every artifact `report` carries into `dir`, named as for
/// download. Returns the written paths.
pub fn save_artifacts(report: &StandardReport, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for kind in [
        ArtifactKind::Json,
        ArtifactKind::Csv,
        ArtifactKind::Png,
        ArtifactKind::Xlsx,
    ] {
        let Some(bytes) = export::artifact_bytes(report, kind)? else {
            continue;
        };
        let path = dir.join(kind.file_name(report.module.id()));
        std::fs::write(&path, bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Artifact written");
        written.push(path);
    }
    Ok(written)
}
