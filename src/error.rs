//! Error types for the service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed upload request
    #[error("Upload error: {0}")]
    Upload(String),

    /// Missing or malformed query parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Direct text-layer extraction failed
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// OCR fallback failed
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Chunking failed: {0}")]
    Chunking(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Hosted LLM call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Raw fallback requested but there is no document to read
    #[error("No document available for raw answering; upload a PDF or set FALLBACK_DOCUMENT")]
    NoFallbackDocument,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }
}

impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::VectorStore(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Io(std::io::Error::other(format!("blocking task failed: {err}")))
    }
}

/// Every failure is reported in the body as `{"error": message}` with status 200;
/// the frontend inspects the payload rather than the status code.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {}", self);
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::OK, body).into_response()
    }
}
