// CleanLog - tests/e2e_pipeline.rs
//
// End-to-end tests for the module pipelines.
//
// These tests run real bill exports from disk through header detection,
// schema mapping, matching and workbook packaging, and real files through
// the dedup scanner. Nothing is mocked.

use cleanlog::app::pipeline;
use cleanlog::core::model::{MatchStatus, Severity, TimeUnit};
use cleanlog::platform::config::AppConfig;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to the on-disk fixture files.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn bill_fixtures() -> Vec<PathBuf> {
    vec![
        fixture("alipay_2024.csv"),
        fixture("wechat_2024.csv"),
        fixture("bank_statement.csv"),
    ]
}

// =============================================================================
// Ledger reconciliation
// =============================================================================

#[test]
fn e2e_reconciles_three_platforms() {
    let run = pipeline::run_finance_etl(&bill_fixtures(), &AppConfig::default());

    assert!(run.skipped.is_empty(), "unexpected skips: {:?}", run.skipped);
    let platforms: Vec<&str> = run.mappings.iter().map(|m| m.platform.as_str()).collect();
    assert_eq!(platforms, vec!["alipay", "wechat", "bank"]);

    // Alipay metadata lines above the header are skipped; the footer is dropped.
    assert_eq!(run.outcome.total(), 8);
    assert_eq!(run.outcome.matched.len(), 4);
    assert_eq!(run.outcome.suspected.len(), 2);
    assert_eq!(run.outcome.unilateral.len(), 2);

    let coffee: Vec<&str> = run
        .outcome
        .matched
        .iter()
        .filter_map(|c| c.transaction.counterparty.as_deref())
        .collect();
    assert_eq!(coffee, vec!["瑞幸咖啡", "张三", "瑞幸咖啡", "张三"]);
    assert!(run
        .outcome
        .suspected
        .iter()
        .all(|c| c.match_status == MatchStatus::SuspectedDuplicate));

    // Net: -25 - 38.5 + 200 (alipay), -25 - 38.5 + 66 (wechat), +200 - 150 (bank).
    assert!((run.consistency.total_amount - 189.0).abs() < 1e-9);
    assert!(!run.consistency.amount_balanced);
    assert_eq!(run.consistency.warnings.len(), 1);
    assert_eq!(run.report.verification_value("Amount balanced"), Some("No"));
    assert_eq!(run.report.verification_value("Net amount (¥)"), Some("189.00"));
}

#[test]
fn e2e_wechat_mapping_uses_original_columns() {
    let run = pipeline::run_finance_etl(&[fixture("wechat_2024.csv")], &AppConfig::default());
    let mapping = &run.mappings[0].mapping;
    assert_eq!(mapping.get("timestamp").map(String::as_str), Some("交易时间"));
    assert_eq!(mapping.get("amount").map(String::as_str), Some("金额(元)"));
    assert_eq!(mapping.get("transaction_id").map(String::as_str), Some("交易单号"));

    let amounts: Vec<f64> = run
        .outcome
        .all()
        .iter()
        .map(|c| c.transaction.amount)
        .collect();
    assert_eq!(amounts, vec![-25.0, -38.5, 66.0]);
}

#[test]
fn e2e_difference_workbook() {
    let run = pipeline::run_finance_etl(&bill_fixtures(), &AppConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let written = pipeline::save_artifacts(&run.report, dir.path()).unwrap();
    assert_eq!(written.len(), 3, "json, csv and xlsx: {written:?}");

    let xlsx = dir.path().join("reconciliation_report.xlsx");
    let mut archive = zip::ZipArchive::new(fs::File::open(&xlsx).unwrap()).unwrap();

    let mut workbook = String::new();
    archive
        .by_name("xl/workbook.xml")
        .unwrap()
        .read_to_string(&mut workbook)
        .unwrap();
    let summary_pos = workbook.find("name=\"Summary\"").unwrap();
    let matched_pos = workbook.find("name=\"Matched\"").unwrap();
    assert!(summary_pos < matched_pos, "Summary must be the first sheet");
    assert!(workbook.contains("name=\"Suspected Duplicates\""));
    assert!(workbook.contains("name=\"Unilateral\""));

    let mut summary = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .unwrap()
        .read_to_string(&mut summary)
        .unwrap();
    assert!(summary.contains("<f>B2+B3+B4</f>"));

    let csv = fs::read(dir.path().join("finance_reconciliation_data.csv")).unwrap();
    assert!(csv.starts_with(b"\xEF\xBB\xBF"));
}

#[test]
fn e2e_missing_bill_is_skipped() {
    let mut paths = bill_fixtures();
    paths.push(fixture("does_not_exist.csv"));
    let run = pipeline::run_finance_etl(&paths, &AppConfig::default());
    assert_eq!(run.skipped.len(), 1);
    assert_eq!(run.outcome.total(), 8);
}

// =============================================================================
// Chat / bill insight
// =============================================================================

#[test]
fn e2e_chat_from_bill_export() {
    let report =
        pipeline::run_chat_analyzer(&fixture("wechat_2024.csv"), TimeUnit::Seconds).unwrap();
    assert_eq!(report.discovery_value("Total messages"), Some("3"));
    assert_eq!(
        report.discovery_value("Date range"),
        Some("2024-03-01 ~ 2024-03-10")
    );
    assert!(report.chart_png.is_some());

    let json: serde_json::Value = serde_json::from_str(&report.report_json).unwrap();
    assert_eq!(json["total_messages"], 3);
}

// =============================================================================
// Log analysis
// =============================================================================

#[test]
fn e2e_log_file() {
    let text = fs::read_to_string(fixture("service.log")).unwrap();
    let report = pipeline::run_log_analyzer(&text);
    assert_eq!(report.discovery_value("Log lines"), Some("6"));
    assert_eq!(report.discovery_value("Anomalous lines"), Some("2"));

    let analysis = cleanlog::core::log_analyzer::analyze(&text);
    let severities: Vec<Severity> = analysis.anomalies.iter().map(|a| a.severity).collect();
    assert_eq!(severities, vec![Severity::Error, Severity::Critical]);
    assert_eq!(analysis.anomalies[0].line_number, 4);
}

// =============================================================================
// File dedup
// =============================================================================

#[test]
fn e2e_dedup_over_two_roots() {
    let downloads = tempfile::tempdir().unwrap();
    let documents = tempfile::tempdir().unwrap();
    let payload = vec![7u8; 4096];
    fs::write(downloads.path().join("report.pdf"), &payload).unwrap();
    fs::write(documents.path().join("report (1).pdf"), &payload).unwrap();
    fs::write(documents.path().join("report (2).pdf"), &payload).unwrap();
    fs::write(documents.path().join("notes.txt"), b"unique").unwrap();

    let roots = vec![downloads.path().to_path_buf(), documents.path().to_path_buf()];
    let output = pipeline::run_file_cleaner(&roots, &AppConfig::default());

    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    assert_eq!(output.report.discovery_value("Files scanned"), Some("4"));
    assert_eq!(output.report.discovery_value("Duplicate groups"), Some("1 groups"));
    assert_eq!(output.report.discovery_value("Duplicate files"), Some("3 files"));
    assert_eq!(
        output.report.verification_value("Estimated files after dedup"),
        Some("2")
    );
    assert!(output
        .report
        .cleaning_actions
        .iter()
        .any(|a| a.contains("2 copies can be deleted")));
}

#[test]
fn e2e_dedup_exclude_patterns() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("node_modules")).unwrap();
    fs::write(root.path().join("node_modules").join("a.js"), b"x").unwrap();
    fs::write(root.path().join("b.js"), b"x").unwrap();

    let config = AppConfig {
        exclude_patterns: vec!["node_modules".to_string()],
        ..AppConfig::default()
    };
    let output = pipeline::run_file_cleaner(&[root.path().to_path_buf()], &config);
    assert_eq!(output.report.discovery_value("Files scanned"), Some("1"));
    assert_eq!(output.report.discovery_value("Duplicate groups"), Some("0 groups"));
}
