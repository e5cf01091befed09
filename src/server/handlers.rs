use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use super::client::render_client_html;
use super::models::{ErrorResponse, ExportRequest, LanguageOption, TranslateRequest};
use super::state::ServerState;
use super::translate::{ServerError, export_request, translate_request};
use crate::languages::TargetLanguage;
use crate::overlay::ResolvedFont;
use crate::settings;

pub async fn run_server(
    settings: settings::Settings,
    font: Option<ResolvedFont>,
    addr: String,
) -> Result<()> {
    let state = Arc::new(ServerState::new(settings, font));
    let app = router(state)?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn router(state: Arc<ServerState>) -> Result<Router> {
    let default_lang = state
        .settings
        .default_language
        .as_deref()
        .and_then(|value| value.parse::<TargetLanguage>().ok())
        .unwrap_or(TargetLanguage::English);
    let html = Arc::new(render_client_html(default_lang)?);
    let body_limit = state.settings.max_upload_bytes();
    Ok(Router::new()
        .route(
            "/",
            get({
                let html = html.clone();
                move || {
                    let html = html.clone();
                    async move { Html((*html).clone()) }
                }
            }),
        )
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/translate", post(translate))
        .route("/export", post(export))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(cors_middleware)))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn languages() -> Json<Vec<LanguageOption>> {
    Json(
        TargetLanguage::ALL
            .iter()
            .map(|lang| LanguageOption {
                name: lang.name(),
                code: lang.code(),
            })
            .collect(),
    )
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
    headers.insert(
        "access-control-expose-headers",
        HeaderValue::from_static("content-disposition"),
    );
}

fn error_response(err: ServerError) -> (StatusCode, Json<ErrorResponse>) {
    (err.status, Json(ErrorResponse { error: err.message }))
}

async fn translate(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<TranslateRequest>,
) -> Response<Body> {
    match translate_request(state.as_ref(), payload).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

async fn export(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<ExportRequest>,
) -> Response<Body> {
    let response = match export_request(state.as_ref(), payload).await {
        Ok(response) => response,
        Err(err) => return error_response(err).into_response(),
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        response.file_name.replace('"', "")
    );
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&response.report.skipped.to_string()) {
        headers.insert("x-skipped-blocks", value);
    }
    (StatusCode::OK, headers, response.png).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    async fn serve(settings: settings::Settings) -> String {
        let app = router(Arc::new(ServerState::new(settings, None))).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn large_export_body() -> serde_json::Value {
        // About 1.8 MB of JPEG-headed bytes, 2.4 MB once base64 encoded.
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.resize(1_800_000, 0);
        serde_json::json!({
            "data_base64": BASE64.encode(&bytes),
            "data_mime": "image/jpeg",
            "data_name": "photo.jpg",
            "result": {}
        })
    }

    #[tokio::test]
    async fn photo_sized_uploads_reach_the_handler() {
        let base = serve(settings::Settings::default()).await;
        let response = reqwest::Client::new()
            .post(format!("{}/export", base))
            .json(&large_export_body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("invalid translation result")
        );
    }

    #[tokio::test]
    async fn configured_upload_limit_is_enforced() {
        let settings = settings::Settings {
            max_upload_mb: 1,
            ..settings::Settings::default()
        };
        let base = serve(settings).await;
        let response = reqwest::Client::new()
            .post(format!("{}/export", base))
            .json(&large_export_body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
    }
}
