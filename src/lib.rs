//! PDF question-answering service: upload PDFs, index their text in a vector
//! store and answer questions with a retrieval-augmented LLM call.

pub mod all_minilm_l6_v2;
pub mod config;
pub mod embedding;
pub mod embedding_model_factory;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod handlers;
pub mod pipeline;
pub mod qdrant_util;
pub mod splitter;
pub mod tokenizer_factory;
pub mod vector_mean;
pub mod vector_store;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{Config, VectorStoreBackend};
use crate::embedding::{Embedder, FastEmbedder};
use crate::error::{Error, Result};
use crate::extractor::{TesseractOcr, TextExtractor};
use crate::generator::{Generator, GroqClient};
use crate::handlers::AppState;
use crate::pipeline::{PipelineSettings, RagPipeline};
use crate::qdrant_util::QdrantVectorStore;
use crate::splitter::Chunker;
use crate::vector_store::{LocalVectorStore, VectorStore};

/// Routes, CORS restricted to `allowed_origin`, and the upload body limit.
pub fn build_router(state: AppState, allowed_origin: &str, max_upload_bytes: usize) -> Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|e| Error::Config(format!("invalid ALLOWED_ORIGIN '{allowed_origin}': {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Ok(Router::new()
        .route("/health", get(handlers::health_check))
        .route("/upload_pdf/", post(handlers::upload_pdf))
        .route("/upload_pdf", post(handlers::upload_pdf))
        .route("/ask/", get(handlers::ask))
        .route("/ask", get(handlers::ask))
        .route("/ask_raw/", get(handlers::ask_raw))
        .route("/ask_raw", get(handlers::ask_raw))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Create the long-lived resources (embedding model, vector store, LLM client)
/// and wire them into the pipeline.
pub async fn build_pipeline(config: &Config) -> Result<Arc<RagPipeline>> {
    let embedding_config = config.embedding.clone();
    let embedder: Arc<dyn Embedder> = Arc::new(
        tokio::task::spawn_blocking(move || FastEmbedder::new(&embedding_config)).await??,
    );

    let store: Arc<dyn VectorStore> = match config.vector_store_backend {
        VectorStoreBackend::Local => Arc::new(LocalVectorStore::open(&config.vector_store_dir).await?),
        VectorStoreBackend::Qdrant => Arc::new(QdrantVectorStore::connect(
            &config.qdrant,
            embedder.dimension() as u64,
        )?),
    };
    tracing::info!("Vector store backend: {}", store.name());

    let generator: Arc<dyn Generator> = Arc::new(GroqClient::new(&config.llm)?);
    let chunker = Chunker::new(config.chunking.clone())?;
    let extractor = TextExtractor::new(Arc::new(TesseractOcr::default()));

    Ok(Arc::new(RagPipeline::new(
        PipelineSettings {
            upload_dir: config.upload_dir.clone(),
            top_k: config.retrieval_top_k,
            fallback_document: config.fallback_document.clone(),
        },
        extractor,
        chunker,
        embedder,
        store,
        generator,
    )))
}
