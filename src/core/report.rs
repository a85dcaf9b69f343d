// CleanLog - core/report.rs
//
// The standard report every module produces: problem discovery, cleaning
// actions, effect verification, plus details and downloadable artifacts.
// Also the number formatting shared by the report builders.

use crate::core::model::Table;
use serde::Serialize;

/// Module identifiers used in reports and download file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    FileCleaner,
    ChatAnalyzer,
    FinanceEtl,
    LogAnalyzer,
}

impl ModuleKind {
    pub fn id(&self) -> &'static str {
        match self {
            ModuleKind::FileCleaner => "file_cleaner",
            ModuleKind::ChatAnalyzer => "chat_analyzer",
            ModuleKind::FinanceEtl => "finance_reconciliation",
            ModuleKind::LogAnalyzer => "log_analyzer",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ModuleKind::FileCleaner => "File Dedup",
            ModuleKind::ChatAnalyzer => "Chat Insight",
            ModuleKind::FinanceEtl => "Ledger Reconciliation",
            ModuleKind::LogAnalyzer => "Log Analysis",
        }
    }

    /// One-line description of the governance scenario the module models.
    pub fn scenario(&self) -> &'static str {
        match self {
            ModuleKind::FileCleaner => {
                "Enterprise data governance · backup index · agent scan · global dedup · storage optimisation report"
            }
            ModuleKind::ChatAnalyzer => {
                "Backup log audit · heterogeneous source integration · task anomaly alerts · governance advice"
            }
            ModuleKind::FinanceEtl => "Financial data integration and consistency verification",
            ModuleKind::LogAnalyzer => "Log analysis · anomaly pattern recognition · operations monitoring",
        }
    }
}

/// Normalised report: problem discovery -> cleaning actions -> effect verification.
#[derive(Debug, Clone, Serialize)]
pub struct StandardReport {
    pub module: ModuleKind,
    pub scenario: &'static str,
    pub problem_discovery: Vec<(String, String)>,
    pub cleaning_actions: Vec<String>,
    pub effect_verification: Vec<(String, String)>,
    pub details: serde_json::Value,
    /// Raw rows offered as CSV download.
    #[serde(skip)]
    pub table: Option<Table>,
    /// Pretty-printed JSON summary offered as download.
    pub report_json: String,
    #[serde(skip)]
    pub chart_png: Option<Vec<u8>>,
    #[serde(skip)]
    pub workbook: Option<Vec<u8>>,
}

impl StandardReport {
    /// Empty report for `module` with its scenario filled in.
    pub fn new(module: ModuleKind) -> Self {
        Self {
            module,
            scenario: module.scenario(),
            problem_discovery: Vec::new(),
            cleaning_actions: Vec::new(),
            effect_verification: Vec::new(),
            details: serde_json::Value::Object(serde_json::Map::new()),
            table: None,
            report_json: "{}".to_string(),
            chart_png: None,
            workbook: None,
        }
    }

    /// Report for a run that found nothing to analyse.
    pub fn empty(module: ModuleKind, notice: &str, error_code: &str) -> Self {
        let mut report = Self::new(module);
        report
            .problem_discovery
            .push(("Notice".to_string(), notice.to_string()));
        report.report_json = serde_json::json!({ "error": error_code }).to_string();
        report
    }

    pub fn discovery(&mut self, label: &str, value: impl Into<String>) -> &mut Self {
        self.problem_discovery.push((label.to_string(), value.into()));
        self
    }

    pub fn verification(&mut self, label: &str, value: impl Into<String>) -> &mut Self {
        self.effect_verification
            .push((label.to_string(), value.into()));
        self
    }

    /// Look up a problem discovery value by label.
    pub fn discovery_value(&self, label: &str) -> Option<&str> {
        lookup(&self.problem_discovery, label)
    }

    /// Look up an effect verification value by label.
    pub fn verification_value(&self, label: &str) -> Option<&str> {
        lookup(&self.effect_verification, label)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], label: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == label)
        .map(|(_, v)| v.as_str())
}

// =============================================================================
// Number formatting
// =============================================================================

/// Integer with thousands separators: 1234567 -> "1,234,567".
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Money with thousands separators and two decimals: -1234.5 -> "-1,234.50".
pub fn money(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let grouped = int_part
        .parse::<usize>()
        .map(thousands)
        .unwrap_or_else(|_| int_part.to_string());
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Round to two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Bytes as decimal gigabytes.
pub fn gigabytes(bytes: f64) -> f64 {
    bytes / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_money() {
        assert_eq!(money(0.0), "0.00");
        assert_eq!(money(1234.5), "1,234.50");
        assert_eq!(money(-98765.432), "-98,765.43");
        assert_eq!(money(-0.001), "0.00");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(33.336), 33.34);
    }

    #[test]
    fn test_empty_report() {
        let report = StandardReport::empty(ModuleKind::FileCleaner, "nothing", "no_files");
        assert_eq!(report.discovery_value("Notice"), Some("nothing"));
        assert!(report.cleaning_actions.is_empty());
        assert_eq!(report.report_json, r#"{"error":"no_files"}"#);
    }
}
