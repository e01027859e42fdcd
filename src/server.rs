//! HTTP server: JSON/multipart API plus static frontend hosting.

use std::path::{Path, PathBuf};

use axum::Router;
use axum::extract::{Json, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::info;

use crate::generate::{self, DEFAULT_BASE_IRI, GenerateError};
use crate::matcher::{self, MatchError};
use crate::model::{MappingEntry, MatchRequest, MatchResponse, Table};
use crate::tabular::{self, TabularError};
use crate::tbox::{self, TboxError};

/// Shared handler state: where generated ABox files land.
#[derive(Clone)]
struct AppState {
    abox_dir: PathBuf,
}

/// An API failure: HTTP status plus a `detail` message, the shape the
/// frontend expects.
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<TboxError> for ApiError {
    fn from(err: TboxError) -> Self {
        Self::bad_request(err)
    }
}

impl From<TabularError> for ApiError {
    fn from(err: TabularError) -> Self {
        Self::bad_request(err)
    }
}

impl From<GenerateError> for ApiError {
    fn from(err: GenerateError) -> Self {
        Self::bad_request(err)
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        // Both llm failures are service problems, not caller mistakes.
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: err.to_string(),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::bad_request(err)
    }
}

#[derive(Deserialize)]
struct AboxRequest {
    #[serde(default)]
    tables: Vec<Table>,

    #[serde(default)]
    mapping: Vec<MappingEntry>,

    #[serde(default = "default_base_iri")]
    base_iri: String,
}

#[derive(Deserialize)]
struct R2rmlRequest {
    #[serde(default)]
    mapping: Vec<MappingEntry>,

    #[serde(default = "default_table_name")]
    table_name: String,

    #[serde(default = "default_base_iri")]
    base_iri: String,
}

fn default_base_iri() -> String {
    DEFAULT_BASE_IRI.to_string()
}

fn default_table_name() -> String {
    "data_table".to_string()
}

/// Build the application router.
fn router(static_dir: &Path, abox_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/version", get(version))
        .route("/api/tbox/parse", post(tbox_parse))
        .route("/api/data/parse", post(data_parse))
        .route("/api/match", post(match_fields))
        .route("/api/abox", post(abox_generate))
        .route("/api/r2rml", post(r2rml_generate))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(AppState { abox_dir })
}

/// Run the server until shutdown.
pub async fn serve(static_dir: &Path, output_dir: &Path, port: u16) -> anyhow::Result<()> {
    let app = router(static_dir, output_dir.join("abox"));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        port,
        static_dir = %static_dir.display(),
        output_dir = %output_dir.display(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// Parse an uploaded ontology file (multipart field `file`).
async fn tbox_parse(mut multipart: Multipart) -> Result<Response, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content = field.bytes().await?;
        let response = tbox::parse_tbox(&content, filename.as_deref())?;
        return Ok(Json(response).into_response());
    }
    Err(ApiError::bad_request("missing multipart field: file"))
}

/// Parse uploaded tabular files (repeated multipart field `files`).
async fn data_parse(mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await?;
        files.push((filename, content.to_vec()));
    }
    let response = tabular::parse_tabular_files(&files)?;
    Ok(Json(response).into_response())
}

async fn match_fields(Json(request): Json<MatchRequest>) -> Result<Json<MatchResponse>, ApiError> {
    Ok(Json(matcher::run_match(&request)?))
}

async fn abox_generate(
    State(state): State<AppState>,
    Json(request): Json<AboxRequest>,
) -> Result<Response, ApiError> {
    let artifact = generate::generate_abox(
        &request.tables,
        &request.mapping,
        &request.base_iri,
        Some(&state.abox_dir),
    )?;
    Ok(Json(artifact).into_response())
}

async fn r2rml_generate(Json(request): Json<R2rmlRequest>) -> Result<Response, ApiError> {
    let artifact = generate::generate_r2rml(&request.mapping, &request.table_name, &request.base_iri);
    Ok(Json(artifact).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_fill_in() {
        let request: AboxRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.base_iri, "http://example.com/");
        assert!(request.tables.is_empty());

        let request: R2rmlRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.table_name, "data_table");
        assert_eq!(request.base_iri, "http://example.com/");
    }

    #[test]
    fn llm_failures_map_to_service_unavailable() {
        let err: ApiError = MatchError::LlmNotConfigured.into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn parse_failures_map_to_bad_request() {
        let err: ApiError = TabularError::NoFiles.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "no data files provided");
    }

    #[test]
    fn router_builds() {
        let dir = tempfile::tempdir().unwrap();
        let _app = router(dir.path(), dir.path().join("abox"));
    }
}
