// CleanLog - web/render.rs
//
// Server-side HTML for the dashboard. Pure functions from reports to
// strings; every user- or file-derived value goes through `escape`.
//
// Layout: sidebar navigation, then the page body. A report renders as
//   header (title + scenario) -> problem discovery -> cleaning actions
//   -> effect verification -> details JSON -> downloads.

use crate::core::export::ArtifactKind;
use crate::core::ledger::ReconciliationRun;
use crate::core::model::{ClassifiedTransaction, STANDARD_SCHEMA};
use crate::core::report::{ModuleKind, StandardReport};
use crate::util::constants;
use base64::Engine as _;
use std::path::PathBuf;

/// Rows shown per table on a page; downloads carry everything.
const PREVIEW_ROWS: usize = 200;

const STYLE: &str = "\
body{margin:0;font-family:system-ui,sans-serif;display:flex;color:#222}\
nav{width:220px;min-height:100vh;background:#f0f2f6;padding:16px;box-sizing:border-box}\
nav a{display:block;padding:6px 8px;color:#222;text-decoration:none;border-radius:4px}\
nav a.active{background:#4472c4;color:#fff}\
main{flex:1;padding:24px 32px;max-width:1100px}\
.caption{color:#666;font-size:0.9em}\
.metrics{display:flex;flex-wrap:wrap;gap:12px}\
.metric{border:1px solid #ddd;border-radius:6px;padding:8px 12px;min-width:150px}\
.metric .label{font-size:0.8em;color:#666}.metric .value{font-size:1.3em}\
table{border-collapse:collapse;font-size:0.85em;margin:8px 0}\
td,th{border:1px solid #ddd;padding:3px 6px}th{background:#4472c4;color:#fff}\
.error{background:#fdecea;border:1px solid #f5c2c0;padding:8px 12px;border-radius:4px}\
.warning{background:#fff4e5;border:1px solid #ffd8a8;padding:8px 12px;border-radius:4px}\
textarea{width:100%;font-family:monospace}";

/// Which sidebar entry is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Home,
    Module(ModuleKind),
}

const NAV_ORDER: [(ModuleKind, &str); 4] = [
    (ModuleKind::FileCleaner, "/dedup"),
    (ModuleKind::ChatAnalyzer, "/chat"),
    (ModuleKind::FinanceEtl, "/ledger"),
    (ModuleKind::LogAnalyzer, "/logs"),
];

/// Minimal HTML escaping for text and attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Full HTML document with the sidebar.
pub fn page(title: &str, nav: Nav, body: &str) -> String {
    let mut links = String::new();
    let home_class = if nav == Nav::Home { " class=\"active\"" } else { "" };
    links.push_str(&format!("<a href=\"/\"{home_class}>Home</a>"));
    for (module, href) in NAV_ORDER {
        let class = if nav == Nav::Module(module) { " class=\"active\"" } else { "" };
        links.push_str(&format!("<a href=\"{href}\"{class}>{}</a>", module.title()));
    }

    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{} · {}</title><style>{STYLE}</style></head><body>\
         <nav><h3>{}</h3><p class=\"caption\">{}</p>{links}\
         <p class=\"caption\">v{}</p></nav><main>{body}</main></body></html>",
        escape(title),
        constants::APP_NAME,
        constants::APP_NAME,
        constants::APP_TAGLINE,
        constants::APP_VERSION,
    )
}

/// Landing page: one card per module.
pub fn home() -> String {
    let mut body = format!(
        "<h1>{}</h1><p class=\"caption\">{}</p>",
        constants::APP_NAME,
        constants::APP_TAGLINE
    );
    body.push_str("<div class=\"metrics\">");
    for (module, href) in NAV_ORDER {
        body.push_str(&format!(
            "<div class=\"metric\"><a href=\"{href}\"><b>{}</b></a><div class=\"label\">{}</div></div>",
            module.title(),
            escape(module.scenario())
        ));
    }
    body.push_str("</div>");
    page("Home", Nav::Home, &body)
}

fn module_header(module: ModuleKind) -> String {
    format!(
        "<h1>{}</h1><p class=\"caption\">{}</p>",
        module.title(),
        escape(module.scenario())
    )
}

/// Inline error box.
pub fn error_box(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", escape(message))
}

/// Warning list, or nothing when there are none.
pub fn warnings_box(warnings: &[String]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let mut out = String::from("<div class=\"warning\"><b>Warnings</b><ul>");
    for w in warnings {
        out.push_str(&format!("<li>{}</li>", escape(w)));
    }
    out.push_str("</ul></div>");
    out
}

fn metrics(pairs: &[(String, String)]) -> String {
    let mut out = String::from("<div class=\"metrics\">");
    for (label, value) in pairs {
        out.push_str(&format!(
            "<div class=\"metric\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>",
            escape(label),
            escape(value)
        ));
    }
    out.push_str("</div>");
    out
}

/// HTML table of at most `PREVIEW_ROWS` rows.
pub fn data_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table><tr>");
    for h in headers {
        out.push_str(&format!("<th>{}</th>", escape(h)));
    }
    out.push_str("</tr>");
    for row in rows.iter().take(PREVIEW_ROWS) {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", escape(cell)));
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    if rows.len() > PREVIEW_ROWS {
        out.push_str(&format!(
            "<p class=\"caption\">Showing {PREVIEW_ROWS} of {} rows.</p>",
            rows.len()
        ));
    }
    out
}

/// Download links for every artifact the report carries.
fn downloads(report: &StandardReport, id: &str) -> String {
    let mut kinds = vec![ArtifactKind::Json];
    if report.table.as_ref().is_some_and(|t| !t.is_empty()) {
        kinds.push(ArtifactKind::Csv);
    }
    if report.chart_png.is_some() {
        kinds.push(ArtifactKind::Png);
    }
    if report.workbook.is_some() {
        kinds.push(ArtifactKind::Xlsx);
    }

    let mut out = String::from("<h2>Downloads</h2><ul>");
    for kind in kinds {
        out.push_str(&format!(
            "<li><a href=\"/download/{}/{}\">{}</a></li>",
            escape(id),
            kind.id(),
            escape(&kind.file_name(report.module.id()))
        ));
    }
    out.push_str("</ul>");
    out
}

/// The three-part report plus details, chart and downloads.
pub fn report_section(report: &StandardReport, id: &str) -> String {
    let mut out = String::new();
    out.push_str("<h2>Problem discovery</h2>");
    out.push_str(&metrics(&report.problem_discovery));

    if !report.cleaning_actions.is_empty() {
        out.push_str("<h2>Cleaning actions</h2><ol>");
        for action in &report.cleaning_actions {
            out.push_str(&format!("<li>{}</li>", escape(action)));
        }
        out.push_str("</ol>");
    }

    if !report.effect_verification.is_empty() {
        out.push_str("<h2>Effect verification</h2>");
        out.push_str(&metrics(&report.effect_verification));
    }

    if let Some(png) = &report.chart_png {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        out.push_str(&format!(
            "<h2>Activity heatmap</h2><p class=\"caption\">Weekday (rows, Monday first) by hour of day</p>\
             <img alt=\"activity heatmap\" src=\"data:image/png;base64,{encoded}\">"
        ));
    }

    let details =
        serde_json::to_string_pretty(&report.details).unwrap_or_else(|_| report.details.to_string());
    out.push_str(&format!(
        "<details><summary>Details</summary><pre>{}</pre></details>",
        escape(&details)
    ));
    out.push_str(&downloads(report, id));
    out
}

// =============================================================================
// Module pages
// =============================================================================

/// Dedup page: path form, then the report when there is one.
pub fn dedup_page(
    paths: &[PathBuf],
    result: Option<(&StandardReport, &str, &[String])>,
    error: Option<&str>,
) -> String {
    let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    let mut body = module_header(ModuleKind::FileCleaner);
    body.push_str(&format!(
        "<form method=\"post\" action=\"/dedup\">\
         <label>Directories to scan (one per line)</label>\
         <textarea name=\"paths\" rows=\"4\">{}</textarea>\
         <button type=\"submit\">Start scan</button></form>",
        escape(&joined.join("\n"))
    ));
    if let Some(message) = error {
        body.push_str(&error_box(message));
    }
    if let Some((report, id, warnings)) = result {
        body.push_str(&warnings_box(warnings));
        body.push_str(&report_section(report, id));
    }
    page(ModuleKind::FileCleaner.title(), Nav::Module(ModuleKind::FileCleaner), &body)
}

/// Chat page: upload or local database path.
pub fn chat_page(result: Option<(&StandardReport, &str)>, error: Option<&str>) -> String {
    let mut body = module_header(ModuleKind::ChatAnalyzer);
    body.push_str(
        "<form method=\"post\" action=\"/chat\" enctype=\"multipart/form-data\">\
         <p><label>Bill export (CSV / Excel) <input type=\"file\" name=\"file\" accept=\".csv,.xlsx,.xls,.db\"></label></p>\
         <p><label>Or local chat database path (.db) <input type=\"text\" name=\"path\" size=\"60\"></label></p>\
         <button type=\"submit\">Analyse</button></form>",
    );
    if let Some(message) = error {
        body.push_str(&error_box(message));
    }
    if let Some((report, id)) = result {
        body.push_str(&report_section(report, id));
    }
    page(ModuleKind::ChatAnalyzer.title(), Nav::Module(ModuleKind::ChatAnalyzer), &body)
}

fn classified_table(rows: &[ClassifiedTransaction]) -> String {
    let mut headers: Vec<String> = STANDARD_SCHEMA.iter().map(|s| s.to_string()).collect();
    headers.push("match_status".to_string());
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut row = r.transaction.cells();
            row.push(r.match_status.id().to_string());
            row
        })
        .collect();
    data_table(&headers, &cells)
}

/// Ledger page: upload form, mappings, report and the three result tables.
pub fn ledger_page(result: Option<(&ReconciliationRun, &str)>, error: Option<&str>) -> String {
    let mut body = module_header(ModuleKind::FinanceEtl);
    body.push_str(
        "<form method=\"post\" action=\"/ledger\" enctype=\"multipart/form-data\">\
         <p><label>Bill files from Alipay, WeChat or bank (CSV / Excel) \
         <input type=\"file\" name=\"files\" multiple accept=\".csv,.xlsx,.xls\"></label></p>\
         <button type=\"submit\">Reconcile</button></form>",
    );
    if let Some(message) = error {
        body.push_str(&error_box(message));
    }

    if let Some((run, id)) = result {
        body.push_str(&warnings_box(&run.skipped));

        if !run.mappings.is_empty() {
            body.push_str("<h2>Column mapping</h2>");
            let headers = vec![
                "file".to_string(),
                "platform".to_string(),
                "standard column".to_string(),
                "original column".to_string(),
            ];
            let rows: Vec<Vec<String>> = run
                .mappings
                .iter()
                .flat_map(|m| {
                    m.mapping.iter().map(move |(standard, original)| {
                        vec![m.file.clone(), m.platform.clone(), standard.clone(), original.clone()]
                    })
                })
                .collect();
            body.push_str(&data_table(&headers, &rows));
        }

        body.push_str(&report_section(&run.report, id));

        if run.outcome.total() > 0 {
            body.push_str(&format!(
                "<h2>Matched ({})</h2>{}<h2>Suspected duplicates ({})</h2>{}<h2>Unilateral ({})</h2>{}",
                run.outcome.matched.len(),
                classified_table(&run.outcome.matched),
                run.outcome.suspected.len(),
                classified_table(&run.outcome.suspected),
                run.outcome.unilateral.len(),
                classified_table(&run.outcome.unilateral),
            ));
        }
        body.push_str(&warnings_box(&run.consistency.warnings));
    }
    page(ModuleKind::FinanceEtl.title(), Nav::Module(ModuleKind::FinanceEtl), &body)
}

/// Log page: paste box, then the report.
pub fn logs_page(
    text: &str,
    result: Option<(&StandardReport, &str)>,
    error: Option<&str>,
) -> String {
    let mut body = module_header(ModuleKind::LogAnalyzer);
    body.push_str(&format!(
        "<form method=\"post\" action=\"/logs\">\
         <label>Log text</label><textarea name=\"text\" rows=\"12\">{}</textarea>\
         <button type=\"submit\">Analyse</button></form>",
        escape(text)
    ));
    if let Some(message) = error {
        body.push_str(&error_box(message));
    }
    if let Some((report, id)) = result {
        body.push_str(&report_section(report, id));
    }
    page(ModuleKind::LogAnalyzer.title(), Nav::Module(ModuleKind::LogAnalyzer), &body)
}

/// Error page for requests that do not reach a module form.
pub fn not_found(message: &str) -> String {
    page("Not found", Nav::Home, &error_box(message))
}
