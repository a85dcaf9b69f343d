// CleanLog - web/mod.rs
//
// Browser dashboard (axum). Binds the configured address and port and
// serves until the process is terminated.
// Dependencies: app, core, platform, util.

pub mod handlers;
pub mod render;

use crate::app::state::AppState;
use crate::util::constants;
use crate::util::error::CleanLogError;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// All dashboard routes with shared state attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/dedup", get(handlers::dedup_form).post(handlers::dedup_run))
        .route("/chat", get(handlers::chat_form).post(handlers::chat_run))
        .route("/ledger", get(handlers::ledger_form).post(handlers::ledger_run))
        .route("/logs", get(handlers::logs_form).post(handlers::logs_run))
        .route("/download/{id}/{kind}", get(handlers::download))
        .fallback(handlers::fallback)
        .layer(DefaultBodyLimit::max(constants::MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `address:port` and serve the dashboard in the foreground.
pub async fn serve(state: AppState, address: &str, port: u16) -> Result<(), CleanLogError> {
    let bind = format!("{address}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|source| CleanLogError::Server {
            address: bind.clone(),
            source,
        })?;

    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| bind.clone());
    tracing::info!(address = %local, "Dashboard listening");
    println!("{} running on http://{local}", constants::APP_NAME);

    axum::serve(listener, router(state))
        .await
        .map_err(|source| CleanLogError::Server {
            address: bind,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::config::AppConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    const BOUNDARY: &str = "cleanlogboundary";

    fn app() -> Router {
        router(AppState::new(AppConfig::default()))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// multipart/form-data body from (field, file name, content) parts.
    fn multipart_post(uri: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (field, file_name, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    /// First `/download/<id>/` id in a rendered page.
    fn report_id(html: &str) -> String {
        let start = html.find("/download/").unwrap() + "/download/".len();
        let rest = &html[start..];
        rest[..rest.find('/').unwrap()].to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_home_lists_modules() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        for href in ["/dedup", "/chat", "/ledger", "/logs"] {
            assert!(html.contains(&format!("href=\"{href}\"")), "missing {href}");
        }
    }

    #[tokio::test]
    async fn test_unknown_page_is_404() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_report_and_download() {
        let app = app();
        let response = app
            .clone()
            .oneshot(form_post("/logs", "text=INFO+boot%0AERROR+disk+failed%0A"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Problem discovery"));
        assert!(html.contains("Parsed 2 log lines"));

        let id = report_id(&html);
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/download/{id}/json"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("log_analyzer_report.json"));
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["total_lines"], 2);

        let response = app
            .oneshot(
                Request::get(format!("/download/{id}/png"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "log reports have no chart");
    }

    #[tokio::test]
    async fn test_logs_without_text_is_400() {
        let app = app();
        for body in ["text=", "text=++%0A%09"] {
            let response = app.clone().oneshot(form_post("/logs", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let html = body_text(response).await;
            assert!(html.contains("Enter log text to analyse"));
            assert!(!html.contains("/download/"));
        }

        // Nothing was stored, so the first real report gets the first id.
        let response = app
            .oneshot(form_post("/logs", "text=WARN+slow+query%0A"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(report_id(&body_text(response).await), "log_analyzer-1");
    }

    #[tokio::test]
    async fn test_download_unknown_is_404() {
        for uri in ["/download/missing-1/json", "/download/log_analyzer-1/exe"] {
            let response = app()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_dedup_requires_paths() {
        let response = app().oneshot(form_post("/dedup", "paths=++")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Enter at least one directory"));
    }

    #[tokio::test]
    async fn test_dedup_scan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"same").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"same").unwrap();
        let body = format!("paths={}", dir.path().display()).replace('/', "%2F");

        let response = app().oneshot(form_post("/dedup", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("1 groups"));
        assert!(html.contains("file_cleaner_data.csv"));
    }

    #[tokio::test]
    async fn test_chat_without_input_is_400() {
        let response = app()
            .oneshot(multipart_post("/chat", &[("path", None, "")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_upload_without_time_column_is_422() {
        let response = app()
            .oneshot(multipart_post(
                "/chat",
                &[("file", Some("bill.csv"), "交易对方,金额\nA,1\n")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_chat_upload_renders_heatmap() {
        let csv = "交易时间,交易类型,交易对方,金额\n\
                   2024-01-01 09:00:00,转账,Alice,10\n\
                   2024-01-02 04:30:00,红包,Bob,5\n";
        let response = app()
            .oneshot(multipart_post("/chat", &[("file", Some("bill.csv"), csv)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("chat_analyzer_chart.png"));
    }

    #[tokio::test]
    async fn test_ledger_upload() {
        let alipay = "交易创建时间,金额,收/支,交易对方\n2024-03-01 10:00:00,25.00,支出,Coffee Shop\n";
        let wechat = "交易时间,金额(元),收/支,交易对方\n2024-03-01 10:02:00,25.00,支出,Coffee Shop\n";
        let response = app()
            .oneshot(multipart_post(
                "/ledger",
                &[
                    ("files", Some("alipay.csv"), alipay),
                    ("files", Some("wechat.csv"), wechat),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Column mapping"));
        assert!(html.contains("Matched (2)"));
        assert!(html.contains("reconciliation_report.xlsx"));
    }

    #[tokio::test]
    async fn test_ledger_without_files_is_400() {
        let response = app()
            .oneshot(multipart_post("/ledger", &[("note", None, "x")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
