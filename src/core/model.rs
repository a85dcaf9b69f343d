// CleanLog - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no web
// dependencies. These types are the shared vocabulary across all layers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// File dedup
// =============================================================================

/// One indexed file. `hash` is filled in by fingerprinting and stays `None`
/// when the file could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Lowercase extension including the leading dot, empty when absent.
    pub extension: String,
    /// Lowercase hex MD5 digest of the full content.
    pub hash: Option<String>,
}

/// Files sharing one fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    /// Member paths in index order.
    pub paths: Vec<PathBuf>,
    /// Size of the first member.
    pub size: u64,
}

/// Which copy of a duplicate group to keep.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub keep: PathBuf,
    pub delete: Vec<PathBuf>,
    pub save_space_mb: f64,
}

// =============================================================================
// Chat / bill insight
// =============================================================================

/// A normalised chat message or bill row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub create_time: NaiveDateTime,
    pub content: String,
    pub sender: String,
    pub nickname: String,
    /// Message type code from the source database (0 for bill rows).
    pub kind: i64,
}

/// Unit of integer timestamps in chat databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "ms")]
    Milliseconds,
}

impl TimeUnit {
    /// Parse the short unit names accepted on the CLI and in config.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "s" | "sec" | "seconds" => Some(Self::Seconds),
            "ms" | "millis" | "milliseconds" => Some(Self::Milliseconds),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Milliseconds => "ms",
        }
    }
}

/// Result of the activity anomaly check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityAnomaly {
    /// Messages sent between 03:00 and 05:59.
    pub night_messages: usize,
    /// Days whose message count deviates beyond the sigma threshold.
    pub anomaly_days: BTreeMap<String, usize>,
    /// Share of anomalous days, percent, two decimals.
    pub risk_score: f64,
}

// =============================================================================
// Ledger reconciliation
// =============================================================================

/// Bill source platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Alipay,
    WeChat,
    Bank,
}

impl Platform {
    /// All platforms in detection order.
    pub fn all() -> &'static [Platform] {
        &[Platform::Alipay, Platform::WeChat, Platform::Bank]
    }

    /// Stable identifier stored in `raw_source`.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Alipay => "alipay",
            Platform::WeChat => "wechat",
            Platform::Bank => "bank",
        }
    }

    /// Display label stored in `account`.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Alipay => "Alipay",
            Platform::WeChat => "WeChat",
            Platform::Bank => "Bank",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A transaction mapped onto the standard schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub timestamp: NaiveDateTime,
    /// Signed amount: income positive, expense negative.
    pub amount: f64,
    pub currency: String,
    pub category: Option<String>,
    pub account: String,
    pub counterparty: Option<String>,
    pub transaction_id: Option<String>,
    pub raw_source: String,
}

/// Standard schema column order used for tables and exports.
pub const STANDARD_SCHEMA: &[&str] = &[
    "timestamp",
    "amount",
    "currency",
    "category",
    "account",
    "counterparty",
    "transaction_id",
    "raw_source",
];

impl Transaction {
    /// Cell values in `STANDARD_SCHEMA` order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_amount(self.amount),
            self.currency.clone(),
            self.category.clone().unwrap_or_default(),
            self.account.clone(),
            self.counterparty.clone().unwrap_or_default(),
            self.transaction_id.clone().unwrap_or_default(),
            self.raw_source.clone(),
        ]
    }
}

/// Float-column rendering: whole amounts keep one decimal ("-25.0").
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{amount:.1}")
    } else {
        amount.to_string()
    }
}

/// Outcome of fuzzy matching for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    SuspectedDuplicate,
    Unilateral,
}

impl MatchStatus {
    pub fn id(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::SuspectedDuplicate => "suspected_duplicate",
            MatchStatus::Unilateral => "unilateral",
        }
    }

    /// Sheet / section title.
    pub fn title(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "Matched",
            MatchStatus::SuspectedDuplicate => "Suspected Duplicates",
            MatchStatus::Unilateral => "Unilateral",
        }
    }
}

/// A transaction tagged with its match status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub match_status: MatchStatus,
}

/// How one source file's columns were mapped.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnMapping {
    pub file: String,
    pub platform: String,
    /// Standard column -> original column.
    pub mapping: BTreeMap<String, String>,
}

/// Result of the ledger consistency check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub amount_balanced: bool,
    pub total_amount: f64,
    pub unilateral_count: usize,
    pub suspected_duplicate_count: usize,
    pub matched_count: usize,
    pub warnings: Vec<String>,
}

impl Default for ConsistencyReport {
    fn default() -> Self {
        Self {
            amount_balanced: true,
            total_amount: 0.0,
            unilateral_count: 0,
            suspected_duplicate_count: 0,
            matched_count: 0,
            warnings: Vec::new(),
        }
    }
}

// =============================================================================
// Log analysis
// =============================================================================

/// Normalised severity levels, ordered from most to least severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    #[default]
    Unknown,
}

impl Severity {
    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Info",
            Severity::Debug => "Debug",
            Severity::Unknown => "Unknown",
        }
    }

    /// Whether a line at this level counts as an anomaly.
    pub fn is_anomalous(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One flagged log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogAnomaly {
    /// 1-based line number among the non-empty lines.
    pub line_number: usize,
    pub severity: Severity,
    pub text: String,
}

/// Result of analysing pasted log text.
#[derive(Debug, Clone, Serialize)]
pub struct LogAnalysis {
    pub total_lines: usize,
    pub anomalies: Vec<LogAnomaly>,
    pub severity_counts: BTreeMap<String, usize>,
    pub summary: String,
}

// =============================================================================
// Tables
// =============================================================================

/// A rectangular grid of strings with a header row.
///
/// Used both for ingestion (bills as loaded) and for CSV export
/// (report tables).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (row, column), empty string when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}
