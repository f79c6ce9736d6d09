//! HTTP handlers
//!
//! Failures are rendered by `Error`'s `IntoResponse` as `{"error": message}`.

use axum::extract::rejection::QueryRejection;
use axum::extract::{multipart::MultipartRejection, Multipart, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pipeline::RagPipeline;

pub const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskParams {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// POST /upload_pdf/
pub async fn upload_pdf(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>> {
    let mut multipart = multipart.map_err(|e| Error::Upload(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Upload(format!("failed to read multipart field: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Upload("the `file` field has no file name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::Upload(format!("failed to read file: {e}")))?;

        tracing::info!("Processing upload: {} ({} bytes)", filename, bytes.len());
        let report = state.pipeline.ingest_upload(&filename, &bytes).await?;
        tracing::info!(
            "Indexed {} chunks from {}",
            report.chunks,
            report.path.display()
        );
        return Ok(Json(MessageResponse {
            message: "PDF processed and stored in vector DB".to_string(),
        }));
    }

    Err(Error::Upload(format!(
        "multipart form has no `{UPLOAD_FIELD}` field"
    )))
}

/// GET /ask/?question=...
pub async fn ask(
    State(state): State<AppState>,
    params: std::result::Result<Query<AskParams>, QueryRejection>,
) -> Result<Json<AnswerResponse>> {
    let question = question(params)?;
    let answer = state.pipeline.ask(&question).await?;
    Ok(Json(AnswerResponse {
        answer: answer.text,
    }))
}

/// GET /ask_raw/?question=...
pub async fn ask_raw(
    State(state): State<AppState>,
    params: std::result::Result<Query<AskParams>, QueryRejection>,
) -> Result<Json<AnswerResponse>> {
    let question = question(params)?;
    let answer = state.pipeline.ask_raw(&question).await?;
    Ok(Json(AnswerResponse {
        answer: answer.text,
    }))
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

fn question(params: std::result::Result<Query<AskParams>, QueryRejection>) -> Result<String> {
    let Query(params) = params.map_err(|e| Error::InvalidQuery(e.body_text()))?;
    let question = params.question.trim();
    if question.is_empty() {
        return Err(Error::InvalidQuery("question must not be empty".to_string()));
    }
    Ok(question.to_string())
}
