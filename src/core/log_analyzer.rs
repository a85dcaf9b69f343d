// CleanLog - core/log_analyzer.rs
//
// Keyword-based analysis of pasted log text. Each non-empty line is given
// the most severe level whose keywords it contains; critical and error
// lines are reported as anomalies.

use crate::core::model::{LogAnalysis, LogAnomaly, Severity, Table};
use crate::core::report::{thousands, ModuleKind, StandardReport};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Anomalies listed in the report details; the CSV carries all of them.
const MAX_DETAIL_ANOMALIES: usize = 50;

/// Level keyword patterns, most severe first. Latin keywords match whole
/// words case-insensitively; CJK keywords match anywhere.
const LEVEL_PATTERNS: &[(Severity, &str)] = &[
    (
        Severity::Critical,
        r"(?i)\b(?:critical|crit|fatal|emerg|emergency|alert|panic)\b|致命|严重",
    ),
    (
        Severity::Error,
        r"(?i)\b(?:error|err|errors|fail|failed|failure|exception|severe)\b|错误|失败|异常",
    ),
    (Severity::Warning, r"(?i)\b(?:warn|warning|warnings)\b|警告"),
    (Severity::Info, r"(?i)\b(?:info|information|notice)\b|信息"),
    (Severity::Debug, r"(?i)\b(?:debug|trace|verbose)\b|调试"),
];

static LEVELS: LazyLock<Vec<(Severity, Regex)>> = LazyLock::new(|| {
    LEVEL_PATTERNS
        .iter()
        .map(|(sev, pat)| (*sev, Regex::new(pat).expect("valid regex")))
        .collect()
});

/// Level of one log line; `Unknown` when no keyword matches.
pub fn classify_line(line: &str) -> Severity {
    LEVELS
        .iter()
        .find(|(_, re)| re.is_match(line))
        .map(|(sev, _)| *sev)
        .unwrap_or(Severity::Unknown)
}

/// Analyse pasted log text.
pub fn analyze(text: &str) -> LogAnalysis {
    let lines: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut severity_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut anomalies = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let severity = classify_line(line);
        *severity_counts
            .entry(severity.label().to_string())
            .or_default() += 1;
        if severity.is_anomalous() {
            anomalies.push(LogAnomaly {
                line_number: i + 1,
                severity,
                text: (*line).to_string(),
            });
        }
    }

    tracing::debug!(
        lines = lines.len(),
        anomalies = anomalies.len(),
        "Log text analysed"
    );

    LogAnalysis {
        total_lines: lines.len(),
        anomalies,
        severity_counts,
        summary: format!("Parsed {} log lines", lines.len()),
    }
}

/// Wrap an analysis in the standard report.
pub fn report(analysis: &LogAnalysis) -> StandardReport {
    if analysis.total_lines == 0 {
        return StandardReport::empty(
            ModuleKind::LogAnalyzer,
            "No log lines to analyse",
            "no_lines",
        );
    }

    let count = |s: Severity| {
        analysis
            .severity_counts
            .get(s.label())
            .copied()
            .unwrap_or(0)
    };
    let anomaly_ratio = analysis.anomalies.len() as f64 / analysis.total_lines as f64 * 100.0;

    let mut report = StandardReport::new(ModuleKind::LogAnalyzer);
    report
        .discovery("Log lines", thousands(analysis.total_lines))
        .discovery("Anomalous lines", analysis.anomalies.len().to_string())
        .discovery("Critical", count(Severity::Critical).to_string())
        .discovery("Error", count(Severity::Error).to_string())
        .discovery("Warning", count(Severity::Warning).to_string());

    report.cleaning_actions = vec![
        "Done: dropped blank lines, classified each line by level keywords".to_string(),
        "Flagged: critical and error lines as anomalies".to_string(),
    ];
    if let Some(first) = analysis.anomalies.first() {
        report.cleaning_actions.push(format!(
            "Advice: start with line {} ({})",
            first.line_number, first.severity
        ));
    }

    report
        .verification("Summary", analysis.summary.clone())
        .verification("Anomaly ratio (%)", format!("{anomaly_ratio:.1}%"));

    let preview: Vec<&LogAnomaly> = analysis.anomalies.iter().take(MAX_DETAIL_ANOMALIES).collect();
    report.details = serde_json::json!({
        "severity_counts": analysis.severity_counts,
        "anomalies": preview,
    });

    let mut table = Table::new(vec![
        "line_number".to_string(),
        "severity".to_string(),
        "text".to_string(),
    ]);
    table.rows = analysis
        .anomalies
        .iter()
        .map(|a| {
            vec![
                a.line_number.to_string(),
                a.severity.label().to_string(),
                a.text.clone(),
            ]
        })
        .collect();
    report.table = Some(table);

    report.report_json =
        serde_json::to_string_pretty(analysis).unwrap_or_else(|_| analysis.summary.clone());
    report
}
