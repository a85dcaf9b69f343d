// CleanLog - web/handlers.rs
//
// Request handlers. Analysis runs on the blocking pool; handlers only
// parse input, store the finished report, and render HTML.
//
// Status codes:
//   - 400: missing or malformed input (no paths, no file, bad upload)
//   - 422: input was received but could not be analysed
//   - 404: unknown page, report id or artifact kind
//   - 500: a worker panicked or an artifact could not be built

use crate::app::pipeline;
use crate::app::state::AppState;
use crate::core::export::ArtifactKind;
use crate::core::ledger::LedgerSource;
use crate::platform::fs;
use crate::util::constants;
use crate::web::render;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use std::path::PathBuf;

/// An HTML page sent with a non-success status.
#[derive(Debug)]
pub struct PageError {
    pub status: StatusCode,
    pub html: String,
}

impl PageError {
    fn new(status: StatusCode, html: String) -> Self {
        Self { status, html }
    }

    fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        tracing::error!(error = %e, "{}", context);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            render::page("Error", render::Nav::Home, &render::error_box(&format!("{context}: {e}"))),
        )
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.status, Html(self.html)).into_response()
    }
}

type PageResult = Result<Html<String>, PageError>;

/// Run blocking analysis work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, PageError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PageError::internal("Analysis worker failed", e))
}

// =============================================================================
// Home / health
// =============================================================================

pub async fn home() -> Html<String> {
    Html(render::home())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "app": constants::APP_NAME,
        "version": constants::APP_VERSION,
    }))
}

pub async fn fallback() -> PageError {
    PageError::new(StatusCode::NOT_FOUND, render::not_found("Page not found"))
}

// =============================================================================
// File dedup
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DedupForm {
    #[serde(default)]
    pub paths: String,
}

pub async fn dedup_form() -> Html<String> {
    Html(render::dedup_page(&fs::default_scan_dirs(), None, None))
}

pub async fn dedup_run(State(state): State<AppState>, Form(form): Form<DedupForm>) -> PageResult {
    let roots = fs::parse_path_list(&form.paths);
    if roots.is_empty() {
        return Err(PageError::new(
            StatusCode::BAD_REQUEST,
            render::dedup_page(&[], None, Some("Enter at least one directory to scan")),
        ));
    }

    let config = state.config.clone();
    let scan_roots = roots.clone();
    let output = blocking(move || pipeline::run_file_cleaner(&scan_roots, &config)).await?;
    for w in &output.warnings {
        tracing::warn!(warning = %w, "Dedup scan warning");
    }

    let id = state.store_report(output.report.clone());
    Ok(Html(render::dedup_page(
        &roots,
        Some((&output.report, &id, &output.warnings)),
        None,
    )))
}

// =============================================================================
// Chat insight
// =============================================================================

pub async fn chat_form() -> Html<String> {
    Html(render::chat_page(None, None))
}

pub async fn chat_run(State(state): State<AppState>, mut multipart: Multipart) -> PageResult {
    let bad_request = |message: &str| {
        PageError::new(StatusCode::BAD_REQUEST, render::chat_page(None, Some(message)))
    };

    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut local_path = String::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(&format!("Upload could not be read: {e}"))),
        };
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("Upload could not be read: {e}")))?;
                if !name.is_empty() && !bytes.is_empty() {
                    upload = Some((name, bytes.to_vec()));
                }
            }
            Some("path") => {
                local_path = field
                    .text()
                    .await
                    .map_err(|e| bad_request(&format!("Path could not be read: {e}")))?
                    .trim()
                    .to_string();
            }
            _ => {}
        }
    }

    let time_unit = pipeline::chat_time_unit(&state.config);
    let result = if !local_path.is_empty() {
        let path = PathBuf::from(local_path);
        blocking(move || pipeline::run_chat_analyzer(&path, time_unit)).await?
    } else if let Some((name, bytes)) = upload {
        tracing::info!(file = %name, size = bytes.len(), "Chat upload received");
        blocking(move || pipeline::run_chat_analyzer_bytes(&bytes, &name)).await?
    } else {
        return Err(bad_request("Upload a bill export or enter a chat database path"));
    };

    match result {
        Ok(report) => {
            let id = state.store_report(report.clone());
            Ok(Html(render::chat_page(Some((&report, &id)), None)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chat source rejected");
            Err(PageError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                render::chat_page(None, Some(&e.to_string())),
            ))
        }
    }
}

// =============================================================================
// Ledger reconciliation
// =============================================================================

pub async fn ledger_form() -> Html<String> {
    Html(render::ledger_page(None, None))
}

pub async fn ledger_run(State(state): State<AppState>, mut multipart: Multipart) -> PageResult {
    let bad_request = |message: &str| {
        PageError::new(StatusCode::BAD_REQUEST, render::ledger_page(None, Some(message)))
    };

    let mut sources = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(&format!("Upload could not be read: {e}"))),
        };
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(&format!("Upload could not be read: {e}")))?;
        if !name.is_empty() && !bytes.is_empty() {
            sources.push(LedgerSource {
                name,
                bytes: bytes.to_vec(),
            });
        }
    }

    if sources.is_empty() {
        return Err(bad_request("Upload at least one bill file"));
    }
    tracing::info!(files = sources.len(), "Bill uploads received");

    let config = state.config.clone();
    let run = blocking(move || pipeline::run_finance_etl_sources(&sources, &config)).await?;
    if run.outcome.total() == 0 {
        let message = match run.skipped.as_slice() {
            [] => "No transactions found".to_string(),
            reasons => reasons.join("; "),
        };
        return Err(PageError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            render::ledger_page(None, Some(&message)),
        ));
    }

    let id = state.store_report(run.report.clone());
    Ok(Html(render::ledger_page(Some((&run, &id)), None)))
}

// =============================================================================
// Log analysis
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LogForm {
    #[serde(default)]
    pub text: String,
}

pub async fn logs_form() -> Html<String> {
    Html(render::logs_page("", None, None))
}

pub async fn logs_run(State(state): State<AppState>, Form(form): Form<LogForm>) -> PageResult {
    if form.text.trim().is_empty() {
        return Err(PageError::new(
            StatusCode::BAD_REQUEST,
            render::logs_page(&form.text, None, Some("Enter log text to analyse")),
        ));
    }
    let report = pipeline::run_log_analyzer(&form.text);
    let id = state.store_report(report.clone());
    Ok(Html(render::logs_page(&form.text, Some((&report, &id)), None)))
}

// =============================================================================
// Downloads
// =============================================================================

pub async fn download(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, PageError> {
    let not_found = |what: &str| PageError::new(StatusCode::NOT_FOUND, render::not_found(what));

    let Some(kind) = ArtifactKind::parse(&kind) else {
        return Err(not_found("Unknown artifact type"));
    };
    let artifact = state
        .artifact(&id, kind)
        .map_err(|e| PageError::internal("Artifact could not be built", e))?
        .ok_or_else(|| not_found("This report or artifact is no longer available"))?;

    tracing::debug!(report = %id, file = %artifact.file_name, size = artifact.bytes.len(), "Artifact served");
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}
