// CleanLog - core/ledger.rs
//
// Cross-platform ledger reconciliation. Bills exported from Alipay,
// WeChat and banks are mapped onto one standard schema, transactions
// that appear on two platforms are paired by amount, time and
// counterparty similarity, and the merged ledger is checked for balance
// and completeness.
//
// Pairing is greedy and order-dependent: each unpaired row takes the
// first later unpaired row that qualifies.

use crate::core::model::{
    ClassifiedTransaction, ColumnMapping, ConsistencyReport, MatchStatus, Platform, Table,
    Transaction, STANDARD_SCHEMA,
};
use crate::core::report::{money, thousands, ModuleKind, StandardReport};
use crate::core::similarity::name_similarity;
use crate::core::table::{self, SourceKind};
use crate::core::xlsx;
use crate::util::constants;
use crate::util::error::IngestError;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

// =============================================================================
// Platform templates
// =============================================================================

/// Candidate source column names per standard column for one platform.
#[derive(Debug)]
pub struct PlatformTemplate {
    pub timestamp: &'static [&'static str],
    pub amount: &'static [&'static str],
    pub direction: &'static [&'static str],
    pub category: &'static [&'static str],
    pub counterparty: &'static [&'static str],
    pub transaction_id: &'static [&'static str],
}

const ALIPAY: PlatformTemplate = PlatformTemplate {
    timestamp: &["创建时间", "交易创建时间", "付款时间"],
    amount: &["金额"],
    direction: &["收/支", "收入/支出"],
    category: &["类型", "交易类型"],
    counterparty: &["交易对方", "对方账户"],
    transaction_id: &["订单号", "交易订单号"],
};

const WECHAT: PlatformTemplate = PlatformTemplate {
    timestamp: &["交易时间"],
    amount: &["金额(元)", "金额"],
    direction: &["收/支"],
    category: &["交易类型"],
    counterparty: &["交易对方", "商品"],
    transaction_id: &["交易单号", "商户单号"],
};

const BANK: PlatformTemplate = PlatformTemplate {
    timestamp: &["交易时间", "交易日期", "记账时间", "交易日期时间"],
    amount: &["金额", "交易金额", "收入金额", "支出金额"],
    direction: &["收付标志", "借贷标志"],
    category: &["摘要", "交易摘要", "交易类型"],
    counterparty: &["对方户名", "交易对手", "对方账号", "对方名称"],
    transaction_id: &["流水号", "交易流水号", "参考号"],
};

/// Column template of a platform.
pub fn template(platform: Platform) -> &'static PlatformTemplate {
    match platform {
        Platform::Alipay => &ALIPAY,
        Platform::WeChat => &WECHAT,
        Platform::Bank => &BANK,
    }
}

/// Split income / expense columns used by some bank exports.
const BANK_INCOME_COLUMNS: &[&str] = &["收入金额", "贷方金额"];
const BANK_EXPENSE_COLUMNS: &[&str] = &["支出金额", "借方金额"];

/// Direction values that mark income; anything else is an expense.
static INCOME_DIRECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("收入|收到|收款|贷|收").expect("valid regex"));

// =============================================================================
// Detection and mapping
// =============================================================================

fn has_any(headers: &[String], candidates: &[&str]) -> bool {
    candidates.iter().any(|c| headers.iter().any(|h| h == c))
}

fn first_present(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| headers.iter().position(|h| h == c))
}

/// Identify the source platform: file name hints first, then column
/// templates in platform order, then bank.
pub fn detect_platform(headers: &[String], file_name: &str) -> Platform {
    let lower = file_name.to_lowercase();

    if file_name.contains("支付宝") || lower.contains("alipay") {
        return Platform::Alipay;
    }
    if file_name.contains("微信") || lower.contains("wechat") || lower.contains("wx") {
        return Platform::WeChat;
    }
    if ["bank", "银行", "bankcard", "流水"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return Platform::Bank;
    }

    for &platform in Platform::all() {
        let t = template(platform);
        if has_any(headers, t.timestamp)
            && (has_any(headers, t.amount) || has_any(headers, t.direction))
        {
            return platform;
        }
    }

    Platform::Bank
}

/// Standard column -> source column index, first candidate present wins.
/// Direction is not a standard column and is resolved separately.
pub fn build_mapping(platform: Platform, headers: &[String]) -> BTreeMap<&'static str, usize> {
    let t = template(platform);
    let mut mapping = BTreeMap::new();
    for (std_col, candidates) in [
        ("timestamp", t.timestamp),
        ("amount", t.amount),
        ("category", t.category),
        ("counterparty", t.counterparty),
        ("transaction_id", t.transaction_id),
    ] {
        if let Some(idx) = first_present(headers, candidates) {
            mapping.insert(std_col, idx);
        }
    }
    mapping
}

// =============================================================================
// Amounts
// =============================================================================

/// Numeric value of an amount cell; thousands separators and currency
/// signs are ignored, anything unparseable is 0.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '¥' | '￥'))
        .collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Signed amount. With a direction value, income keeps its sign and
/// everything else becomes a negative expense.
pub fn parse_amount(raw: &str, direction: Option<&str>) -> f64 {
    let value = parse_number(raw);
    match direction {
        None => value,
        Some(d) => {
            if INCOME_DIRECTION.is_match(d) {
                value
            } else {
                -value.abs()
            }
        }
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// One bill file mapped onto the standard schema.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub transactions: Vec<Transaction>,
    /// `None` when the file held no rows.
    pub platform: Option<Platform>,
    /// Standard column -> original column name.
    pub mapping: BTreeMap<String, String>,
}

impl Extraction {
    pub fn platform_id(&self) -> &'static str {
        self.platform.map(|p| p.id()).unwrap_or("unknown")
    }
}

/// Read a bill table from CSV or Excel bytes. Metadata lines above a
/// recognisable header row are skipped; otherwise the first row is the
/// header.
fn read_bill_table(bytes: &[u8], file_name: &str) -> Result<Table, IngestError> {
    let mut table = match SourceKind::from_file_name(file_name) {
        SourceKind::Excel => {
            let rows = table::read_sheet_rows(bytes, file_name)?;
            let header = table::find_header_row(&rows).unwrap_or(0);
            table::table_from_rows(rows, header)
        }
        SourceKind::Csv => {
            let text = table::decode_text(bytes, file_name)?;
            let rows = table::read_csv_rows(&text, file_name)?;
            let header = table::find_header_record(&rows).unwrap_or(0);
            table::table_from_rows(rows, header)
        }
        SourceKind::Sqlite => {
            return Err(IngestError::UnsupportedFormat {
                file: file_name.to_owned(),
            })
        }
    };
    table.headers = table.headers.iter().map(|h| table::clean_name(h)).collect();
    Ok(table)
}

fn optional_cell(table: &Table, row: usize, col: Option<usize>) -> Option<String> {
    col.map(|c| table.cell(row, c).trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Load one bill file, detect its platform and map it onto the standard
/// schema. Rows whose timestamp does not parse are dropped.
pub fn extract_with_auto_schema(bytes: &[u8], file_name: &str) -> Result<Extraction, IngestError> {
    let table = read_bill_table(bytes, file_name)?;
    if table.is_empty() {
        tracing::debug!(file = file_name, "Bill file has no rows");
        return Ok(Extraction::default());
    }

    let platform = detect_platform(&table.headers, file_name);
    let columns = build_mapping(platform, &table.headers);
    let t = template(platform);

    let ts_col = columns
        .get("timestamp")
        .copied()
        .ok_or_else(|| IngestError::MissingTimeColumn {
            file: file_name.to_owned(),
            columns: table.headers.clone(),
        })?;
    let amount_col = columns.get("amount").copied();
    let direction_col = first_present(&table.headers, t.direction);
    let income_col = first_present(&table.headers, BANK_INCOME_COLUMNS);
    let expense_col = first_present(&table.headers, BANK_EXPENSE_COLUMNS);

    let mut transactions = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let Some(timestamp) = table::parse_datetime(table.cell(row, ts_col)) else {
            continue;
        };

        let amount = match amount_col {
            Some(c) => parse_amount(
                table.cell(row, c),
                direction_col.map(|d| table.cell(row, d)),
            ),
            None if platform == Platform::Bank => {
                let income = income_col.map(|c| parse_number(table.cell(row, c)));
                let expense = expense_col.map(|c| parse_number(table.cell(row, c)));
                income.unwrap_or(0.0) - expense.unwrap_or(0.0)
            }
            None => 0.0,
        };

        transactions.push(Transaction {
            timestamp,
            amount,
            currency: "CNY".to_string(),
            category: optional_cell(&table, row, columns.get("category").copied()),
            account: platform.label().to_string(),
            counterparty: optional_cell(&table, row, columns.get("counterparty").copied()),
            transaction_id: optional_cell(&table, row, columns.get("transaction_id").copied()),
            raw_source: platform.id().to_string(),
        });
    }

    let mapping = columns
        .iter()
        .map(|(std_col, &idx)| (std_col.to_string(), table.headers[idx].clone()))
        .collect();

    tracing::info!(
        file = file_name,
        platform = platform.id(),
        rows = table.len(),
        transactions = transactions.len(),
        "Bill file mapped"
    );

    Ok(Extraction {
        transactions,
        platform: Some(platform),
        mapping,
    })
}

// =============================================================================
// Matching and consistency
// =============================================================================

/// Rows split by match status, each in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    pub matched: Vec<ClassifiedTransaction>,
    pub suspected: Vec<ClassifiedTransaction>,
    pub unilateral: Vec<ClassifiedTransaction>,
}

impl MatchOutcome {
    pub fn total(&self) -> usize {
        self.matched.len() + self.suspected.len() + self.unilateral.len()
    }

    /// Matched, then suspected, then unilateral.
    pub fn all(&self) -> Vec<ClassifiedTransaction> {
        self.matched
            .iter()
            .chain(&self.suspected)
            .chain(&self.unilateral)
            .cloned()
            .collect()
    }
}

/// Matching tolerances.
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub amount_tolerance: f64,
    pub time_window_minutes: i64,
    pub name_similarity_threshold: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            amount_tolerance: constants::DEFAULT_AMOUNT_TOLERANCE,
            time_window_minutes: constants::DEFAULT_TIME_WINDOW_MINUTES,
            name_similarity_threshold: constants::DEFAULT_NAME_SIMILARITY_THRESHOLD,
        }
    }
}

/// One bill file given to a reconciliation run.
#[derive(Debug, Clone)]
pub struct LedgerSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything a reconciliation run produces.
#[derive(Debug, Clone)]
pub struct ReconciliationRun {
    pub report: StandardReport,
    pub mappings: Vec<ColumnMapping>,
    pub outcome: MatchOutcome,
    pub consistency: ConsistencyReport,
    /// Files that could not be loaded, with the reason.
    pub skipped: Vec<String>,
}

impl Reconciler {
    /// Pair transactions across platforms.
    pub fn fuzzy_match(&self, txns: &[Transaction]) -> MatchOutcome {
        let mut status: Vec<MatchStatus> = vec![MatchStatus::Unilateral; txns.len()];

        if txns.len() >= 2 {
            let window_ms = self.time_window_minutes * 60 * 1000;
            let mut paired = vec![false; txns.len()];

            for i in 0..txns.len() {
                if paired[i] {
                    continue;
                }
                let a = &txns[i];
                let name_a = a.counterparty.as_deref().unwrap_or("");

                for j in (i + 1)..txns.len() {
                    if paired[j] {
                        continue;
                    }
                    let b = &txns[j];
                    if (a.amount - b.amount).abs() > self.amount_tolerance {
                        continue;
                    }
                    if (a.timestamp - b.timestamp).num_milliseconds().abs() > window_ms {
                        continue;
                    }
                    let sim = name_similarity(name_a, b.counterparty.as_deref().unwrap_or(""));
                    if sim < self.name_similarity_threshold {
                        continue;
                    }

                    let pair_status = if sim >= constants::CONFIRMED_MATCH_SIMILARITY {
                        MatchStatus::Matched
                    } else {
                        MatchStatus::SuspectedDuplicate
                    };
                    status[i] = pair_status;
                    status[j] = pair_status;
                    paired[i] = true;
                    paired[j] = true;
                    break;
                }
            }
        }

        let mut outcome = MatchOutcome::default();
        for (txn, st) in txns.iter().zip(status) {
            let tagged = ClassifiedTransaction {
                transaction: txn.clone(),
                match_status: st,
            };
            match st {
                MatchStatus::Matched => outcome.matched.push(tagged),
                MatchStatus::SuspectedDuplicate => outcome.suspected.push(tagged),
                MatchStatus::Unilateral => outcome.unilateral.push(tagged),
            }
        }

        tracing::debug!(
            rows = txns.len(),
            matched = outcome.matched.len(),
            suspected = outcome.suspected.len(),
            unilateral = outcome.unilateral.len(),
            "Fuzzy matching complete"
        );
        outcome
    }

    /// Balance and completeness check over classified rows.
    pub fn consistency_check(&self, rows: &[ClassifiedTransaction]) -> ConsistencyReport {
        let count = |s: MatchStatus| rows.iter().filter(|r| r.match_status == s).count();
        let total_amount: f64 = rows.iter().map(|r| r.transaction.amount).sum();
        finish_consistency(
            rows.len(),
            total_amount,
            count(MatchStatus::Matched),
            count(MatchStatus::SuspectedDuplicate),
            count(MatchStatus::Unilateral),
        )
    }

    /// Consistency check over rows not yet classified; they are matched first.
    pub fn consistency_check_unclassified(&self, txns: &[Transaction]) -> ConsistencyReport {
        let outcome = self.fuzzy_match(txns);
        let total_amount: f64 = txns.iter().map(|t| t.amount).sum();
        finish_consistency(
            txns.len(),
            total_amount,
            outcome.matched.len(),
            outcome.suspected.len(),
            outcome.unilateral.len(),
        )
    }

    /// Load every source, merge, match, check, and build the report and
    /// difference workbook. Unloadable files are skipped.
    pub fn run(&self, sources: &[LedgerSource]) -> ReconciliationRun {
        let mut merged: Vec<Transaction> = Vec::new();
        let mut mappings = Vec::new();
        let mut skipped = Vec::new();

        for source in sources {
            match extract_with_auto_schema(&source.bytes, &source.name) {
                Ok(extraction) if !extraction.transactions.is_empty() => {
                    mappings.push(ColumnMapping {
                        file: source.name.clone(),
                        platform: extraction.platform_id().to_string(),
                        mapping: extraction.mapping,
                    });
                    merged.extend(extraction.transactions);
                }
                Ok(_) => {
                    tracing::warn!(file = %source.name, "Bill file yielded no transactions, skipping");
                    skipped.push(format!("{}: no transactions", source.name));
                }
                Err(e) => {
                    tracing::warn!(file = %source.name, error = %e, "Skipping bill file");
                    skipped.push(e.to_string());
                }
            }
        }

        if merged.is_empty() {
            return ReconciliationRun {
                report: StandardReport::empty(
                    ModuleKind::FinanceEtl,
                    "No bill file could be loaded",
                    "no_data",
                ),
                mappings,
                outcome: MatchOutcome::default(),
                consistency: ConsistencyReport::default(),
                skipped,
            };
        }

        let merged = drop_duplicate_rows(merged);
        let outcome = self.fuzzy_match(&merged);
        let consistency = self.consistency_check(&outcome.all());

        let mut report = StandardReport::new(ModuleKind::FinanceEtl);
        report
            .discovery("Total transactions", thousands(merged.len()))
            .discovery("Matched", outcome.matched.len().to_string())
            .discovery("Suspected duplicates", outcome.suspected.len().to_string())
            .discovery("Unilateral", outcome.unilateral.len().to_string());
        report
            .cleaning_actions
            .push("Done: schema auto-mapping, fuzzy matching, consistency check".to_string());
        report
            .verification(
                "Amount balanced",
                if consistency.amount_balanced { "Yes" } else { "No" },
            )
            .verification("Net amount (¥)", money(consistency.total_amount));

        report.details = serde_json::json!({
            "consistency": consistency,
            "mappings": mappings,
        });

        let mut table = Table::new(STANDARD_SCHEMA.iter().map(|s| s.to_string()).collect());
        table.rows = merged.iter().map(Transaction::cells).collect();
        report.table = Some(table);

        let summary = serde_json::json!({
            "matched": outcome.matched.len(),
            "suspected_duplicate": outcome.suspected.len(),
            "unilateral": outcome.unilateral.len(),
            "consistency": consistency,
        });
        report.report_json =
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string());

        report.workbook = match xlsx::reconciliation_workbook(&outcome, &consistency) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "Difference workbook could not be built");
                None
            }
        };

        tracing::info!(
            files = mappings.len(),
            transactions = merged.len(),
            matched = outcome.matched.len(),
            suspected = outcome.suspected.len(),
            unilateral = outcome.unilateral.len(),
            balanced = consistency.amount_balanced,
            "Reconciliation complete"
        );

        ReconciliationRun {
            report,
            mappings,
            outcome,
            consistency,
            skipped,
        }
    }
}

fn finish_consistency(
    rows: usize,
    total_amount: f64,
    matched_count: usize,
    suspected_duplicate_count: usize,
    unilateral_count: usize,
) -> ConsistencyReport {
    let mut report = ConsistencyReport {
        amount_balanced: true,
        total_amount,
        unilateral_count,
        suspected_duplicate_count,
        matched_count,
        warnings: Vec::new(),
    };
    if rows == 0 {
        return report;
    }

    if total_amount.abs() > constants::BALANCE_TOLERANCE {
        report.amount_balanced = false;
        report.warnings.push(format!(
            "Amount imbalance: net ¥{}, check unilateral entries",
            money(total_amount)
        ));
    }
    if unilateral_count as f64 > rows as f64 * constants::UNILATERAL_WARNING_RATIO {
        report
            .warnings
            .push("Unilateral entries exceed half of all rows, check data completeness".to_string());
    }
    report
}

/// Drop rows identical in every standard column, keeping the first.
fn drop_duplicate_rows(rows: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    rows.into_iter().filter(|t| seen.insert(t.cells())).collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn txn(time: &str, amount: f64, counterparty: Option<&str>, source: Platform) -> Transaction {
        Transaction {
            timestamp: at(time),
            amount,
            currency: "CNY".into(),
            category: None,
            account: source.label().into(),
            counterparty: counterparty.map(str::to_string),
            transaction_id: None,
            raw_source: source.id().into(),
        }
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_platform_by_file_name() {
        let cols = headers(&["交易时间", "金额"]);
        assert_eq!(detect_platform(&cols, "支付宝账单.csv"), Platform::Alipay);
        assert_eq!(detect_platform(&cols, "ALIPAY_2024.csv"), Platform::Alipay);
        assert_eq!(detect_platform(&cols, "wx_bill.csv"), Platform::WeChat);
        assert_eq!(detect_platform(&cols, "招商银行.csv"), Platform::Bank);
        assert_eq!(detect_platform(&cols, "流水.xlsx"), Platform::Bank);
    }

    #[test]
    fn test_detect_platform_by_columns() {
        assert_eq!(
            detect_platform(&headers(&["创建时间", "收/支"]), "export.csv"),
            Platform::Alipay
        );
        assert_eq!(
            detect_platform(&headers(&["交易时间", "金额(元)"]), "export.csv"),
            Platform::WeChat
        );
        assert_eq!(
            detect_platform(&headers(&["记账时间", "交易金额"]), "export.csv"),
            Platform::Bank
        );
        assert_eq!(detect_platform(&headers(&["foo"]), "export.csv"), Platform::Bank);
    }

    #[test]
    fn test_build_mapping_first_candidate_wins() {
        let cols = headers(&["交易单号", "商户单号", "交易时间", "金额(元)", "商品"]);
        let mapping = build_mapping(Platform::WeChat, &cols);
        assert_eq!(mapping.get("timestamp"), Some(&2));
        assert_eq!(mapping.get("amount"), Some(&3));
        assert_eq!(mapping.get("transaction_id"), Some(&0));
        assert_eq!(mapping.get("counterparty"), Some(&4));
        assert_eq!(mapping.get("category"), None);
    }

    #[test]
    fn test_parse_amount_signs() {
        assert_eq!(parse_amount("1,234.50", None), 1234.5);
        assert_eq!(parse_amount("¥30.00", Some("支出")), -30.0);
        assert_eq!(parse_amount("-30.00", Some("支出")), -30.0);
        assert_eq!(parse_amount("100", Some("收入")), 100.0);
        assert_eq!(parse_amount("100", Some("贷")), 100.0);
        assert_eq!(parse_amount("100", Some("/")), -100.0);
        assert_eq!(parse_amount("abc", Some("收入")), 0.0);
        assert_eq!(parse_amount("nan", None), 0.0);
    }

    #[test]
    fn test_income_direction_keywords() {
        for direction in ["收入", "已收款", "收到转账", "贷方", "收"] {
            assert_eq!(parse_amount("8", Some(direction)), 8.0, "{direction}");
        }
        for direction in ["支出", "借", "转出", ""] {
            assert_eq!(parse_amount("8", Some(direction)), -8.0, "{direction}");
        }
    }

    #[test]
    fn test_extract_alipay_csv_with_metadata_lines() {
        let csv = "支付宝交易记录明细查询\n\
账号:[demo]\n\
交易号,创建时间,交易对方,商品名称,金额,收/支,类型\n\
A1,2024-03-01 12:00:00,星巴克,拿铁,30.00,支出,即时到账\n\
A2,2024-03-01 13:00:00,张三,转账,\"1,000.00\",收入,即时到账\n\
A3,bad-time,李四,转账,5.00,收入,即时到账\n";
        let extraction = extract_with_auto_schema(csv.as_bytes(), "alipay.csv").unwrap();
        assert_eq!(extraction.platform, Some(Platform::Alipay));
        assert_eq!(extraction.transactions.len(), 2);

        let first = &extraction.transactions[0];
        assert_eq!(first.amount, -30.0);
        assert_eq!(first.account, "Alipay");
        assert_eq!(first.raw_source, "alipay");
        assert_eq!(first.currency, "CNY");
        assert_eq!(first.counterparty.as_deref(), Some("星巴克"));
        assert_eq!(first.category.as_deref(), Some("即时到账"));
        assert_eq!(extraction.transactions[1].amount, 1000.0);
        assert_eq!(extraction.mapping.get("timestamp").map(String::as_str), Some("创建时间"));
        assert!(!extraction.mapping.contains_key("transaction_id"));
    }

    #[test]
    fn test_extract_csv_with_multiline_quoted_field() {
        let csv = "支付宝交易记录明细查询\n\
交易号,创建时间,交易对方,商品名称,金额,收/支,类型\n\
A1,2024-03-01 12:00:00,\"星巴克\n国贸店\",拿铁,30.00,支出,即时到账\n\
A2,2024-03-01 13:00:00,张三,转账,5.00,收入,即时到账\n";
        let extraction = extract_with_auto_schema(csv.as_bytes(), "alipay.csv").unwrap();
        assert_eq!(extraction.platform, Some(Platform::Alipay));
        assert_eq!(extraction.transactions.len(), 2);
        assert_eq!(
            extraction.transactions[0].counterparty.as_deref(),
            Some("星巴克\n国贸店")
        );
        assert_eq!(extraction.transactions[1].amount, 5.0);
    }

    #[test]
    fn test_extract_bank_split_columns() {
        let csv = "交易日期,贷方金额,借方金额,对方户名\n\
2024-03-01,100.00,,公司\n\
2024-03-02,,25.5,超市\n";
        let extraction = extract_with_auto_schema(csv.as_bytes(), "icbc.csv").unwrap();
        assert_eq!(extraction.platform, Some(Platform::Bank));
        let amounts: Vec<f64> = extraction.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![100.0, -25.5]);
    }

    #[test]
    fn test_extract_bank_income_column_maps_as_amount() {
        // 收入金额 is itself an amount candidate, so it is used directly.
        let csv = "交易日期,收入金额,支出金额\n2024-03-01,,40\n";
        let extraction = extract_with_auto_schema(csv.as_bytes(), "bank.csv").unwrap();
        assert_eq!(extraction.mapping.get("amount").map(String::as_str), Some("收入金额"));
        assert_eq!(extraction.transactions[0].amount, 0.0);
    }

    #[test]
    fn test_extract_missing_timestamp_is_error() {
        let csv = "金额,备注\n1,x\n";
        let err = extract_with_auto_schema(csv.as_bytes(), "bank.csv").unwrap_err();
        assert!(matches!(err, IngestError::MissingTimeColumn { .. }));
    }

    #[test]
    fn test_extract_empty_file() {
        let extraction = extract_with_auto_schema(b"a,b\n", "x.csv").unwrap();
        assert!(extraction.transactions.is_empty());
        assert_eq!(extraction.platform_id(), "unknown");
    }

    #[test]
    fn test_fuzzy_match_classification() {
        let r = Reconciler::default();
        let txns = vec![
            txn("2024-03-01 12:00:00", -30.0, Some("星巴克"), Platform::Alipay),
            txn("2024-03-01 12:03:00", -30.0, Some("星巴克"), Platform::Bank),
            txn("2024-03-01 15:00:00", -88.0, Some("星巴克咖啡"), Platform::WeChat),
            txn("2024-03-01 15:01:00", -88.0, Some("星巴克"), Platform::Bank),
            txn("2024-03-01 18:00:00", -12.0, Some("超市"), Platform::WeChat),
        ];
        let outcome = r.fuzzy_match(&txns);
        assert_eq!(outcome.matched.len(), 2);
        assert_eq!(outcome.suspected.len(), 2, "similarity 0.75 is a suspected duplicate");
        assert_eq!(outcome.unilateral.len(), 1);
        assert_eq!(outcome.unilateral[0].transaction.amount, -12.0);
        assert!(outcome
            .matched
            .iter()
            .all(|c| c.match_status == MatchStatus::Matched));
    }

    #[test]
    fn test_fuzzy_match_respects_window_and_tolerance() {
        let r = Reconciler::default();
        let txns = vec![
            txn("2024-03-01 12:00:00", -30.0, Some("A"), Platform::Alipay),
            txn("2024-03-01 12:05:01", -30.0, Some("A"), Platform::Bank),
            txn("2024-03-01 12:00:00", -30.02, Some("A"), Platform::Bank),
        ];
        let outcome = r.fuzzy_match(&txns);
        assert_eq!(outcome.unilateral.len(), 3);

        let txns = vec![
            txn("2024-03-01 12:00:00", -30.0, Some("A"), Platform::Alipay),
            txn("2024-03-01 12:05:00", -30.005, Some("A"), Platform::Bank),
        ];
        assert_eq!(r.fuzzy_match(&txns).matched.len(), 2);
    }

    #[test]
    fn test_fuzzy_match_each_row_pairs_once() {
        let r = Reconciler::default();
        let txns = vec![
            txn("2024-03-01 12:00:00", -30.0, Some("A"), Platform::Alipay),
            txn("2024-03-01 12:01:00", -30.0, Some("A"), Platform::Bank),
            txn("2024-03-01 12:02:00", -30.0, Some("A"), Platform::WeChat),
        ];
        let outcome = r.fuzzy_match(&txns);
        assert_eq!(outcome.matched.len(), 2);
        assert_eq!(outcome.unilateral.len(), 1);
        assert_eq!(outcome.unilateral[0].transaction.raw_source, "wechat");
    }

    #[test]
    fn test_fuzzy_match_missing_counterparties_match() {
        let r = Reconciler::default();
        let txns = vec![
            txn("2024-03-01 12:00:00", 5.0, None, Platform::Alipay),
            txn("2024-03-01 12:00:00", 5.0, None, Platform::Bank),
        ];
        assert_eq!(r.fuzzy_match(&txns).matched.len(), 2);
    }

    #[test]
    fn test_fuzzy_match_single_row() {
        let r = Reconciler::default();
        let outcome = r.fuzzy_match(&[txn("2024-03-01 12:00:00", 1.0, None, Platform::Bank)]);
        assert_eq!(outcome.unilateral.len(), 1);
        assert_eq!(outcome.total(), 1);
    }

    #[test]
    fn test_consistency_warnings() {
        let r = Reconciler::default();
        let start = at("2024-03-01 00:00:00");
        let txns: Vec<Transaction> = (0..3)
            .map(|i| Transaction {
                timestamp: start + Duration::hours(i),
                ..txn("2024-03-01 00:00:00", -200.0, Some("X"), Platform::Bank)
            })
            .collect();
        let report = r.consistency_check_unclassified(&txns);
        assert!(!report.amount_balanced);
        assert_eq!(report.total_amount, -600.0);
        assert_eq!(report.unilateral_count, 3);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("-600.00"));
    }

    #[test]
    fn test_consistency_balanced() {
        let r = Reconciler::default();
        let txns = vec![
            txn("2024-03-01 12:00:00", -30.0, Some("A"), Platform::Alipay),
            txn("2024-03-01 12:00:00", -30.0, Some("A"), Platform::Bank),
        ];
        let outcome = r.fuzzy_match(&txns);
        let report = r.consistency_check(&outcome.all());
        assert!(report.amount_balanced);
        assert_eq!(report.matched_count, 2);
        assert!(report.warnings.is_empty());

        let empty = r.consistency_check(&[]);
        assert!(empty.amount_balanced);
        assert!(empty.warnings.is_empty());
    }

    #[test]
    fn test_run_merges_and_reports() {
        let alipay = "创建时间,交易对方,金额,收/支\n\
2024-03-01 12:00:00,星巴克,30.00,支出\n";
        let bank = "交易时间,交易金额,对方户名\n\
2024-03-01 12:02:00,-30.00,星巴克\n\
2024-03-01 12:02:00,-30.00,星巴克\n\
2024-03-02 09:00:00,5000.00,公司\n";
        let sources = vec![
            LedgerSource {
                name: "alipay.csv".into(),
                bytes: alipay.as_bytes().to_vec(),
            },
            LedgerSource {
                name: "bank.csv".into(),
                bytes: bank.as_bytes().to_vec(),
            },
            LedgerSource {
                name: "chat.db".into(),
                bytes: Vec::new(),
            },
        ];
        let run = Reconciler::default().run(&sources);

        assert_eq!(run.mappings.len(), 2);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.report.discovery_value("Total transactions"), Some("3"));
        assert_eq!(run.report.discovery_value("Matched"), Some("2"));
        assert_eq!(run.report.discovery_value("Unilateral"), Some("1"));
        assert_eq!(run.report.verification_value("Amount balanced"), Some("No"));
        assert_eq!(run.report.verification_value("Net amount (¥)"), Some("4,940.00"));
        assert!(run.report.workbook.is_some());
        assert_eq!(run.report.table.as_ref().unwrap().len(), 3);

        let summary: serde_json::Value = serde_json::from_str(&run.report.report_json).unwrap();
        assert_eq!(summary["matched"], 2);
        assert_eq!(summary["consistency"]["amount_balanced"], false);
    }

    #[test]
    fn test_run_nothing_loaded() {
        let run = Reconciler::default().run(&[]);
        assert_eq!(run.report.report_json, r#"{"error":"no_data"}"#);
        assert!(run.report.workbook.is_none());
    }
}
