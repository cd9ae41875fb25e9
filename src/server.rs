//! HTTP server for uploads, processing, and content reads.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/health` | no | Health check (returns version) |
//! | `GET`  | `/content/{category}` | no | Public content index |
//! | `GET`  | `/api/{category}` | yes | Content index for the admin panel |
//! | `POST` | `/api/{category}/upload-url` | yes | Issue a pre-signed upload URL |
//! | `POST` | `/api/{category}/process` | yes | Process an uploaded original |
//! | `GET`  | `/admin/{category}` | yes (redirect) | Admin listing page |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `storage_error`, `processing_error`, `index_error`, `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the admin front end
//! can be served from another origin.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::auth::AccessGate;
use crate::config::Config;
use crate::error::FolioError;
use crate::index::{IndexStore, JsonFileIndexStore};
use crate::models::{Category, ContentIndex};
use crate::pipeline::{CompleteUploadRequest, CompletedUpload, UploadPipeline};
use crate::presign::{issue_upload_url, UploadUrlRequest, UploadUrlResponse};
use crate::store::s3::S3ObjectStore;
use crate::store::ObjectStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn IndexStore>,
    pipeline: Arc<UploadPipeline>,
    gate: Arc<AccessGate>,
}

impl AppState {
    pub fn new(
        config: &Config,
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn IndexStore>,
        gate: AccessGate,
    ) -> Self {
        let pipeline = UploadPipeline::new(objects.clone(), index.clone(), &config.processing);
        Self {
            config: Arc::new(config.clone()),
            objects,
            index,
            pipeline: Arc::new(pipeline),
            gate: Arc::new(gate),
        }
    }
}

/// Starts the server with the S3 store and JSON index files from `config`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let objects = S3ObjectStore::from_env(config.storage.clone())
        .context("Failed to set up S3 object store")?;
    let index = JsonFileIndexStore::new(&config.content.dir);
    let gate = AccessGate::from_config(&config.auth);

    run_server_with_stores(config, Arc::new(objects), Arc::new(index), gate).await
}

/// Starts the server on explicit store and gate instances.
///
/// Used by [`run_server`] and by tests that substitute in-memory stores.
pub async fn run_server_with_stores(
    config: &Config,
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn IndexStore>,
    gate: AccessGate,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(AppState::new(config, objects, index, gate));

    info!("folio server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with all routes and the CORS layer.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/content/{category}", get(handle_public_content))
        .route("/api/{category}", get(handle_admin_content))
        .route("/api/{category}/upload-url", post(handle_upload_url))
        .route("/api/{category}/process", post(handle_process))
        .route("/admin/{category}", get(handle_admin_page))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized() -> AppError {
    AppError::new(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "a valid admin session is required",
    )
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<FolioError> for AppError {
    fn from(err: FolioError) -> Self {
        // Details stay in the log; clients get a fixed message per code.
        let (code, message) = match err {
            FolioError::Validation(_) => return bad_request(err.to_string()),
            FolioError::Storage(_) => ("storage_error", "storage operation failed"),
            FolioError::Imaging(_) => ("processing_error", "image could not be processed"),
            FolioError::Index(_) => ("index_error", "content index unavailable"),
        };
        error!(code, "{}", err);
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }
}

fn parse_category(raw: &str) -> Result<Category, AppError> {
    raw.parse().map_err(|e: anyhow::Error| not_found(e.to_string()))
}

/// Reject the request unless it carries a valid session.
async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    match state.gate.is_authenticated(headers).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(unauthorized()),
        Err(e) => {
            error!("session check failed: {:#}", e);
            Err(internal("session check failed"))
        }
    }
}

async fn read_index(state: &AppState, category: Category) -> Result<ContentIndex, AppError> {
    state
        .index
        .read(category)
        .await
        .map_err(|e| FolioError::Index(e).into())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /content/{category}, GET /api/{category} ============

/// Public read of a category index, as consumed by the portfolio pages.
async fn handle_public_content(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<ContentIndex>, AppError> {
    let category = parse_category(&category)?;
    Ok(Json(read_index(&state, category).await?))
}

async fn handle_admin_content(
    State(state): State<AppState>,
    Path(category): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ContentIndex>, AppError> {
    require_session(&state, &headers).await?;
    let category = parse_category(&category)?;
    Ok(Json(read_index(&state, category).await?))
}

// ============ POST /api/{category}/upload-url ============

async fn handle_upload_url(
    State(state): State<AppState>,
    Path(category): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    require_session(&state, &headers).await?;
    let category = parse_category(&category)?;
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;

    let resp = issue_upload_url(
        state.objects.as_ref(),
        category,
        &req,
        state.config.storage.presign_expiry_secs,
    )?;
    Ok(Json(resp))
}

// ============ POST /api/{category}/process ============

async fn handle_process(
    State(state): State<AppState>,
    Path(category): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CompleteUploadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CompletedUpload>), AppError> {
    require_session(&state, &headers).await?;
    let category = parse_category(&category)?;
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;

    let completed = state.pipeline.complete(category, &req).await?;
    Ok((StatusCode::CREATED, Json(completed)))
}

// ============ GET /admin/{category} ============

/// Admin listing page. Viewers without a session are redirected to login.
async fn handle_admin_page(
    State(state): State<AppState>,
    Path(category): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    match state.gate.is_authenticated(&headers).await {
        Ok(true) => {}
        Ok(false) => return Ok(Redirect::to(state.gate.login_path()).into_response()),
        Err(e) => {
            error!("session check failed: {:#}", e);
            return Err(internal("session check failed"));
        }
    }
    let category = parse_category(&category)?;

    let index = read_index(&state, category).await?;
    Ok(Html(render_admin_page(category, &index)).into_response())
}

fn render_admin_page(category: Category, index: &ContentIndex) -> String {
    let mut rows = String::new();
    for record in &index.records {
        let thumb = record.thumbnail_url.as_deref().unwrap_or(&record.url);
        rows.push_str(&format!(
            "<tr><td><img src=\"{}\" alt=\"\" loading=\"lazy\"></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(thumb),
            escape_html(&record.title),
            escape_html(record.description.as_deref().unwrap_or("")),
            escape_html(&record.category),
            escape_html(&record.created_at),
        ));
    }

    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{cat} · admin</title></head>\n\
         <body><h1>{cat}</h1><p>{count} records</p>\n\
         <table><thead><tr><th></th><th>Title</th><th>Description</th><th>Category</th><th>Added</th></tr></thead>\n\
         <tbody>\n{rows}</tbody></table></body></html>\n",
        cat = category,
        count = index.len(),
        rows = rows,
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
