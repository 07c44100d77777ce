//! Request handlers.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use crate::analysis::{run_analysis, AnalyzeBody};
use crate::error::RelayError;
use crate::pipeline::extract;
use crate::pipeline::input::{has_pdf_extension, StagedUpload};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub analyze_enabled: bool,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        service: env!("CARGO_PKG_NAME").into(),
        version: env!("CARGO_PKG_VERSION").into(),
        analyze_enabled: state.client.is_some(),
    })
}

/// Upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_text: String,
    pub page_count: usize,
}

/// Handler: POST /upload
///
/// The staged copy of the upload is gone by the time this returns, whatever
/// the outcome.
pub async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, RelayError> {
    let multipart = multipart.map_err(|e| {
        debug!("Upload rejected before reading parts: {}", e);
        RelayError::MissingFilePart
    })?;
    let bytes = read_pdf_part(multipart, state.config.max_upload_bytes).await?;
    info!("Upload received: {} bytes", bytes.len());

    let staged = StagedUpload::write(&state.config.upload_dir, bytes).await?;
    let extracted = extract::extract_file(staged.path()).await;
    staged.discard();
    let extracted = extracted?;

    info!(
        "Extracted {} chars from {} pages",
        extracted.text.len(),
        extracted.page_count
    );
    Ok(Json(UploadResponse {
        document_text: extracted.text,
        page_count: extracted.page_count,
    }))
}

/// Find the `file` part, check its name, and read its bytes.
async fn read_pdf_part(mut multipart: Multipart, limit: usize) -> Result<Vec<u8>, RelayError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        // A part without a filename parameter is a plain form value, not a file.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            return Err(RelayError::NoSelectedFile);
        }
        if !has_pdf_extension(&filename) {
            return Err(RelayError::UnsupportedFileType { filename });
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit))?;
        return Ok(bytes.to_vec());
    }
    Err(RelayError::MissingFilePart)
}

fn multipart_error(err: MultipartError, limit: usize) -> RelayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge { limit }
    } else {
        RelayError::InvalidRequest(err.body_text())
    }
}

fn json_error(err: JsonRejection, limit: usize) -> RelayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge { limit }
    } else {
        RelayError::InvalidRequest(err.body_text())
    }
}

/// Analyze response
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis_result: String,
}

/// Handler: POST /analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, RelayError> {
    let Json(body) = body.map_err(|e| json_error(e, state.config.max_upload_bytes))?;
    let request = body.validate()?;
    let client = state.client.as_ref().ok_or(RelayError::NotConfigured)?;

    info!(
        "Analyze request: mode={}, {} chars, {} history entries",
        request.mode,
        request.document_text.len(),
        request.history.len()
    );

    let analysis_result = run_analysis(&state.config, client, &request).await?;
    Ok(Json(AnalyzeResponse { analysis_result }))
}
