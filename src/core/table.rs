// CleanLog - core/table.rs
//
// Tabular ingestion shared by the chat and ledger modules: text decoding
// with legacy Chinese encodings, CSV and spreadsheet reading into a
// `Table`, header-row location, column cleanup, and lenient timestamp
// parsing.
//
// All readers take bytes, so uploads and local files go through the same
// path. Every cell is kept as a string; typing happens in the modules.

use crate::core::model::Table;
use crate::util::constants;
use crate::util::error::IngestError;
use calamine::{Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Cursor;
use std::path::Path;

// =============================================================================
// Source kinds
// =============================================================================

/// Supported source formats, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Excel,
    Sqlite,
}

impl SourceKind {
    /// Classify a file name. Unknown extensions are read as CSV.
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(&name.to_lowercase())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_owned)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xls" => SourceKind::Excel,
            "db" => SourceKind::Sqlite,
            _ => SourceKind::Csv,
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode bytes as UTF-8 (BOM stripped), falling back to GBK then GB18030.
pub fn decode_text(bytes: &[u8], file: &str) -> Result<String, IngestError> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return Ok(text.to_owned());
    }
    for encoding in [encoding_rs::GBK, encoding_rs::GB18030] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
            tracing::debug!(file, encoding = encoding.name(), "Decoded with legacy encoding");
            return Ok(text.into_owned());
        }
    }
    Err(IngestError::UndecodableText {
        file: file.to_owned(),
    })
}

// =============================================================================
// CSV
// =============================================================================

/// Read every CSV record as strings, without header handling.
///
/// Records may differ in width, so metadata lines above the header and
/// summary lines below it survive as short rows. Quoted fields may span
/// lines.
pub fn read_csv_rows(text: &str, file: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.trim().as_bytes());

    reader
        .records()
        .map(|rec| {
            rec.map(|r| r.iter().map(str::to_owned).collect())
                .map_err(|source| IngestError::Csv {
                    file: file.to_owned(),
                    source,
                })
        })
        .collect()
}

// =============================================================================
// Spreadsheets
// =============================================================================

/// Read every row of the first worksheet as strings, without header handling.
pub fn read_sheet_rows(bytes: &[u8], file: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|source| IngestError::Spreadsheet {
            file: file.to_owned(),
            source,
        })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(r) => r.map_err(|source| IngestError::Spreadsheet {
            file: file.to_owned(),
            source,
        })?,
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

/// Read the first worksheet with its first row as the header.
pub fn read_excel(bytes: &[u8], file: &str) -> Result<Table, IngestError> {
    let rows = read_sheet_rows(bytes, file)?;
    Ok(table_from_rows(rows, 0))
}

/// Build a table from raw rows using `header_row` as the header.
/// Rows above the header are discarded.
pub fn table_from_rows(rows: Vec<Vec<String>>, header_row: usize) -> Table {
    let mut iter = rows.into_iter().skip(header_row);
    let headers = match iter.next() {
        Some(h) => h,
        None => return Table::default(),
    };
    let width = headers.len();
    let mut table = Table::new(headers);
    for mut row in iter {
        row.resize(width, String::new());
        table.rows.push(row);
    }
    table
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    }
}

// =============================================================================
// Header location and cleanup
// =============================================================================

/// Number of (cell, keyword) pairs where the cell contains the keyword.
pub fn header_keyword_hits(cells: &[String]) -> usize {
    cells
        .iter()
        .map(|c| {
            constants::HEADER_KEYWORDS
                .iter()
                .filter(|kw| c.contains(*kw))
                .count()
        })
        .sum()
}

fn looks_like_header(row: &[String]) -> bool {
    let cells: Vec<String> = row
        .iter()
        .map(|c| clean_name(c))
        .filter(|c| !c.is_empty())
        .collect();
    header_keyword_hits(&cells) >= constants::HEADER_MIN_KEYWORD_HITS
}

/// Index of the first CSV record that looks like a bill header.
pub fn find_header_record(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter().position(|row| looks_like_header(row))
}

/// Index of the first spreadsheet row (within the search window) that looks
/// like a bill header.
pub fn find_header_row(rows: &[Vec<String>]) -> Option<usize> {
    rows.iter()
        .take(constants::EXCEL_HEADER_SEARCH_ROWS)
        .position(|row| looks_like_header(row))
}

/// Trim whitespace and surrounding quotes from a column name or cell.
pub fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_owned()
}

/// Drop unnamed columns and columns empty in every row; clean header names.
pub fn clean_table(table: Table) -> Table {
    let keep: Vec<usize> = (0..table.headers.len())
        .filter(|&i| {
            let name = table.headers[i].trim();
            if name.is_empty() || name.starts_with("Unnamed") {
                return false;
            }
            table
                .rows
                .iter()
                .any(|r| r.get(i).is_some_and(|v| !v.trim().is_empty()))
        })
        .collect();

    Table {
        headers: keep.iter().map(|&i| clean_name(&table.headers[i])).collect(),
        rows: table
            .rows
            .iter()
            .map(|r| {
                keep.iter()
                    .map(|&i| r.get(i).cloned().unwrap_or_default())
                    .collect()
            })
            .collect(),
    }
}

// =============================================================================
// Timestamps
// =============================================================================

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y%m%d %H:%M:%S",
    "%Y%m%d%H%M%S",
    "%Y年%m月%d日 %H:%M:%S",
    "%Y年%m月%d日 %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%Y年%m月%d日"];

/// Parse a timestamp leniently; `None` when no known layout fits.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_matches(|c| c == '"' || c == '\t');
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// =============================================================================
// Tests
// =============================================================================
