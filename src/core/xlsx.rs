// CleanLog - core/xlsx.rs
//
// Minimal Office Open XML workbook writer: a ZIP of XML parts, no shared
// string table (text cells are inline), three cell styles. Enough for the
// reconciliation difference report, which needs a formula cell and a
// styled header row.

use crate::core::model::{ConsistencyReport, MatchStatus, STANDARD_SCHEMA};
use crate::core::ledger::MatchOutcome;
use crate::util::error::ExportError;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Cell formatting, indexes into the `cellXfs` table of styles.xml.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Normal,
    /// Bold white text on a 4472C4 fill.
    Header,
    /// Bold 14pt text.
    Title,
}

impl CellStyle {
    fn index(&self) -> usize {
        match self {
            CellStyle::Normal => 0,
            CellStyle::Header => 1,
            CellStyle::Title => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    /// Formula without the leading '='.
    Formula(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(s.into()),
            style: CellStyle::Normal,
        }
    }

    pub fn number(n: f64) -> Self {
        Self {
            value: CellValue::Number(n),
            style: CellStyle::Normal,
        }
    }

    pub fn formula(f: impl Into<String>) -> Self {
        Self {
            value: CellValue::Formula(f.into()),
            style: CellStyle::Normal,
        }
    }

    pub fn styled(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// Workbook under construction. Sheets keep insertion order.
#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: &str, rows: Vec<Vec<Cell>>) {
        self.sheets.push(Sheet {
            name: name.to_string(),
            rows,
        });
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Package the workbook as .xlsx bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".into(), self.content_types_xml()),
            ("_rels/.rels".into(), ROOT_RELS.to_string()),
            ("xl/workbook.xml".into(), self.workbook_xml()),
            ("xl/_rels/workbook.xml.rels".into(), self.workbook_rels_xml()),
            ("xl/styles.xml".into(), STYLES.to_string()),
        ];
        for (i, sheet) in self.sheets.iter().enumerate() {
            parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(sheet)));
        }

        for (name, body) in parts {
            zip.start_file(name, options)
                .map_err(|source| ExportError::Workbook { source })?;
            zip.write_all(body.as_bytes())
                .map_err(|source| ExportError::Workbook {
                    source: source.into(),
                })?;
        }

        let cursor = zip
            .finish()
            .map_err(|source| ExportError::Workbook { source })?;
        Ok(cursor.into_inner())
    }

    fn content_types_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
"#,
        );
        for i in 1..=self.sheets.len() {
            xml.push_str(&format!(
                "<Override PartName=\"/xl/worksheets/sheet{i}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n"
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
"#,
        );
        for (i, sheet) in self.sheets.iter().enumerate() {
            xml.push_str(&format!(
                "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>\n",
                escape(&sheet.name),
                i + 1,
                i + 1
            ));
        }
        xml.push_str("</sheets>\n<calcPr fullCalcOnLoad=\"1\"/>\n</workbook>");
        xml
    }

    fn workbook_rels_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
        );
        let n = self.sheets.len();
        for i in 1..=n {
            xml.push_str(&format!(
                "<Relationship Id=\"rId{i}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{i}.xml\"/>\n"
            ));
        }
        xml.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\n",
            n + 1
        ));
        xml.push_str("</Relationships>");
        xml
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

// Fill 1 (gray125) is mandatory after fill 0 even though nothing uses it.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="3">
<font><sz val="11"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font>
<font><b/><sz val="14"/><name val="Calibri"/></font>
</fonts>
<fills count="3">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FF4472C4"/><bgColor rgb="FF4472C4"/></patternFill></fill>
</fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="3">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/>
<xf numFmtId="0" fontId="2" fillId="0" borderId="0" xfId="0" applyFont="1"/>
</cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

fn sheet_xml(sheet: &Sheet) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
"#,
    );
    for (r, row) in sheet.rows.iter().enumerate() {
        let row_num = r + 1;
        xml.push_str(&format!("<row r=\"{row_num}\">"));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{row_num}", column_name(c));
            let style = cell.style.index();
            let s_attr = if style == 0 {
                String::new()
            } else {
                format!(" s=\"{style}\"")
            };
            match &cell.value {
                CellValue::Text(t) => xml.push_str(&format!(
                    "<c r=\"{reference}\"{s_attr} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                    escape(t)
                )),
                CellValue::Number(n) => {
                    xml.push_str(&format!("<c r=\"{reference}\"{s_attr}><v>{n}</v></c>"))
                }
                CellValue::Formula(f) => xml.push_str(&format!(
                    "<c r=\"{reference}\"{s_attr}><f>{}</f></c>",
                    escape(f)
                )),
            }
        }
        xml.push_str("</row>\n");
    }
    xml.push_str("</sheetData>\n</worksheet>");
    xml
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not allowed in XML 1.0.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

// =============================================================================
// Reconciliation report
// =============================================================================

/// Difference report: Summary first, then one sheet per match status.
pub fn reconciliation_workbook(
    outcome: &MatchOutcome,
    consistency: &ConsistencyReport,
) -> Result<Vec<u8>, ExportError> {
    let mut wb = Workbook::new();

    let summary = vec![
        vec![Cell::text("Reconciliation Summary").styled(CellStyle::Title)],
        vec![Cell::text("Matched"), Cell::number(outcome.matched.len() as f64)],
        vec![
            Cell::text("Suspected duplicates"),
            Cell::number(outcome.suspected.len() as f64),
        ],
        vec![
            Cell::text("Unilateral"),
            Cell::number(outcome.unilateral.len() as f64),
        ],
        vec![Cell::text("Total (formula)"), Cell::formula("B2+B3+B4")],
        vec![
            Cell::text("Amount balanced"),
            Cell::text(if consistency.amount_balanced { "Yes" } else { "No" }),
        ],
        vec![
            Cell::text("Net amount"),
            Cell::number(consistency.total_amount),
        ],
    ];
    wb.add_sheet("Summary", summary);

    for (status, rows) in [
        (MatchStatus::Matched, &outcome.matched),
        (MatchStatus::SuspectedDuplicate, &outcome.suspected),
        (MatchStatus::Unilateral, &outcome.unilateral),
    ] {
        let mut sheet_rows = Vec::with_capacity(rows.len() + 1);
        sheet_rows.push(
            STANDARD_SCHEMA
                .iter()
                .chain(std::iter::once(&"match_status"))
                .map(|h| Cell::text(*h).styled(CellStyle::Header))
                .collect(),
        );
        for row in rows {
            let mut cells: Vec<Cell> = row
                .transaction
                .cells()
                .into_iter()
                .map(Cell::text)
                .collect();
            cells[1] = Cell::number(row.transaction.amount);
            cells.push(Cell::text(row.match_status.id()));
            sheet_rows.push(cells);
        }
        wb.add_sheet(status.title(), sheet_rows);
    }

    tracing::debug!(sheets = ?wb.sheet_names(), "Reconciliation workbook assembled");
    wb.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ClassifiedTransaction, Transaction};
    use chrono::NaiveDate;
    use std::io::Read;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    fn classified(amount: f64, status: MatchStatus) -> ClassifiedTransaction {
        ClassifiedTransaction {
            transaction: Transaction {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
                amount,
                currency: "CNY".into(),
                category: None,
                account: "Alipay".into(),
                counterparty: Some("A&B <Shop>".into()),
                transaction_id: None,
                raw_source: "alipay".into(),
            },
            match_status: status,
        }
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape("x\u{1}y"), "xy");
    }

    #[test]
    fn test_reconciliation_workbook_layout() {
        let outcome = MatchOutcome {
            matched: vec![
                classified(-30.0, MatchStatus::Matched),
                classified(-30.0, MatchStatus::Matched),
            ],
            suspected: vec![],
            unilateral: vec![classified(12.5, MatchStatus::Unilateral)],
        };
        let consistency = ConsistencyReport {
            total_amount: -47.5,
            matched_count: 2,
            unilateral_count: 1,
            ..Default::default()
        };
        let bytes = reconciliation_workbook(&outcome, &consistency).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let workbook = read_part(&bytes, "xl/workbook.xml");
        let summary_pos = workbook.find("name=\"Summary\"").unwrap();
        let matched_pos = workbook.find("name=\"Matched\"").unwrap();
        assert!(summary_pos < matched_pos, "Summary must be the first sheet");
        assert!(workbook.contains("name=\"Suspected Duplicates\""));
        assert!(workbook.contains("name=\"Unilateral\""));

        let summary = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(summary.contains("<c r=\"B5\"><f>B2+B3+B4</f></c>"));
        assert!(summary.contains("<c r=\"B2\"><v>2</v></c>"));
        assert!(summary.contains("<c r=\"B7\"><v>-47.5</v></c>"));
        assert!(summary.contains(">Yes<"));

        let matched = read_part(&bytes, "xl/worksheets/sheet2.xml");
        assert!(matched.contains("<c r=\"A1\" s=\"1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">timestamp</t>"));
        assert!(matched.contains("<c r=\"I1\" s=\"1\""), "match_status header styled");
        assert!(matched.contains("<c r=\"B2\"><v>-30</v></c>"));
        assert!(matched.contains("A&amp;B &lt;Shop&gt;"));

        let styles = read_part(&bytes, "xl/styles.xml");
        assert!(styles.contains("FF4472C4"));
    }

    #[test]
    fn test_empty_status_sheets_keep_header() {
        let outcome = MatchOutcome::default();
        let bytes = reconciliation_workbook(&outcome, &ConsistencyReport::default()).unwrap();
        let suspected = read_part(&bytes, "xl/worksheets/sheet3.xml");
        assert_eq!(suspected.matches("<row ").count(), 1);
    }
}
