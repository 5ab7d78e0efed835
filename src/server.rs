//! HTTP surface: axum routes over a shared [`Pipeline`].
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | POST | `/laboratory/solve` | multipart: `problemFile`, optional `latexTemplate` |
//! | POST | `/studio/recolor-latex` | JSON `{ latexInput, targetColor }` |
//! | POST | `/latex/generate` | JSON `{ latexCode }` |
//! | GET  | `/health` | |
//!
//! Every job route answers with exactly one JSON body: [`JobResponse`] on
//! success, [`ErrorResponse`] otherwise. Malformed JSON or multipart bodies
//! are reported in the same shape as any other invalid request instead of
//! axum's plain-text rejections.

use crate::error::TutorError;
use crate::job::{JobOutput, Pipeline, SolveRequest};
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Success body shared by every job route.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub message: String,
    pub latex: String,
    pub pdf_base64: String,
}

impl From<JobOutput> for JobResponse {
    fn from(output: JobOutput) -> Self {
        Self {
            message: output.message().to_string(),
            pdf_base64: output.pdf_base64(),
            latex: output.latex,
        }
    }
}

/// Failure body shared by every job route.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latex_log: Option<String>,
}

/// [`TutorError`] as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub TutorError);

impl From<TutorError> for ApiError {
    fn from(e: TutorError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(TutorError::invalid_request(rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self(TutorError::invalid_request(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = self.0;
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            message: e.summary(),
            error: Some(e.to_string()),
            latex_log: e.compile_log().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecolorBody {
    pub latex_input: Option<String>,
    pub target_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub latex_code: Option<String>,
}

/// Build the router with every route and the upload size limit.
pub fn router(pipeline: Pipeline) -> Router {
    let body_limit = pipeline.config().max_upload_bytes;
    Router::new()
        .route("/health", get(health_check))
        .route("/laboratory/solve", post(solve))
        .route("/studio/recolor-latex", post(recolor))
        .route("/latex/generate", post(generate))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(pipeline)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, pipeline: Pipeline) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP server listening on {}", addr);
    }
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// POST /laboratory/solve
pub async fn solve(
    State(pipeline): State<Pipeline>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut template: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TutorError::invalid_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "problemFile" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| TutorError::invalid_request(e.body_text()))?;
                file = Some((content_type, bytes.to_vec()));
            }
            "latexTemplate" => {
                template = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| TutorError::invalid_request(e.body_text()))?,
                );
            }
            other => warn!("Ignoring unexpected multipart field '{}'", other),
        }
    }

    let (media_type, file) = file.ok_or_else(|| TutorError::invalid_request("No file uploaded."))?;
    info!(media_type = %media_type, bytes = file.len(), "Received solve request");

    let output = pipeline
        .solve(&SolveRequest {
            file,
            media_type,
            template,
        })
        .await?;
    Ok(Json(output.into()))
}

/// POST /studio/recolor-latex
pub async fn recolor(
    State(pipeline): State<Pipeline>,
    payload: Result<Json<RecolorBody>, JsonRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Json(body) = payload?;
    info!("Received recolor request");
    let output = pipeline
        .recolor(body.latex_input.as_deref(), body.target_color.as_deref())
        .await?;
    Ok(Json(output.into()))
}

/// POST /latex/generate
pub async fn generate(
    State(pipeline): State<Pipeline>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Json(body) = payload?;
    info!("Received generate request");
    let output = pipeline.compile(body.latex_code.as_deref()).await?;
    Ok(Json(output.into()))
}
