// CleanLog - core/export.rs
//
// Downloadable artifacts of a standard report: the raw table as CSV and
// the JSON summary. Core layer: writes to any Write trait object.
//
// CSV output starts with a UTF-8 byte order mark so spreadsheet tools
// open Chinese column names correctly.

use crate::core::model::Table;
use crate::core::report::StandardReport;
use crate::util::error::ExportError;
use std::io::Write;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Artifact kinds offered for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Json,
    Csv,
    Png,
    Xlsx,
}

impl ArtifactKind {
    /// Parse the URL segment used by download links.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "png" => Some(Self::Png),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Png => "png",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Png => "image/png",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// Download file name for a report of the given module id.
    pub fn file_name(&self, module_id: &str) -> String {
        match self {
            Self::Json => format!("{module_id}_report.json"),
            Self::Csv => format!("{module_id}_data.csv"),
            Self::Png => format!("{module_id}_chart.png"),
            Self::Xlsx => "reconciliation_report.xlsx".to_string(),
        }
    }
}

/// Write a table as CSV (header first). Returns the number of data rows.
pub fn export_csv<W: Write>(
    table: &Table,
    mut writer: W,
    artifact: &'static str,
) -> Result<usize, ExportError> {
    writer.write_all(UTF8_BOM).map_err(|e| ExportError::Csv {
        artifact,
        source: e.into(),
    })?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(&table.headers)
        .map_err(|e| ExportError::Csv {
            artifact,
            source: e,
        })?;

    let mut count = 0;
    for row in &table.rows {
        csv_writer.write_record(row).map_err(|e| ExportError::Csv {
            artifact,
            source: e,
        })?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Csv {
        artifact,
        source: e.into(),
    })?;

    Ok(count)
}

/// Bytes of one artifact of `report`, or `None` when the report has none
/// of that kind.
pub fn artifact_bytes(
    report: &StandardReport,
    kind: ArtifactKind,
) -> Result<Option<Vec<u8>>, ExportError> {
    match kind {
        ArtifactKind::Json => Ok(Some(report.report_json.clone().into_bytes())),
        ArtifactKind::Csv => match report.table {
            Some(ref table) if !table.is_empty() => {
                let mut buf = Vec::new();
                export_csv(table, &mut buf, "report table")?;
                Ok(Some(buf))
            }
            _ => Ok(None),
        },
        ArtifactKind::Png => Ok(report.chart_png.clone()),
        ArtifactKind::Xlsx => Ok(report.workbook.clone()),
    }
}
