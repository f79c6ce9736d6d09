use async_trait::async_trait;
use fastembed::TextEmbedding;
use std::sync::Arc;

use crate::all_minilm_l6_v2;
use crate::config::EmbeddingConfig;
use crate::embedding_model_factory;
use crate::error::{Error, Result};
use crate::splitter;
use crate::vector_mean;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// all-MiniLM-L6-v2 through fastembed. The model is loaded once and shared.
#[derive(Clone)]
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = embedding_model_factory::get_model(config)?;
        tracing::info!(
            "Loaded embedding model {} ({} dimensions)",
            all_minilm_l6_v2::MODEL_NAME,
            all_minilm_l6_v2::VECTOR_SIZE
        );
        Ok(Self {
            model: Arc::new(model),
        })
    }

    fn embed_blocking(model: &TextEmbedding, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let embeddings = model
            .embed(texts, None)
            .map_err(|e| Error::embedding(e.to_string()))?;
        if embeddings.len() != expected {
            return Err(Error::embedding(format!(
                "model returned {} embeddings for {} inputs",
                embeddings.len(),
                expected
            )));
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || Self::embed_blocking(&model, texts)).await?
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let pieces = query_pieces(text)?;
        let weights = piece_weights(&pieces);
        let embeddings = self.embed_documents(pieces).await?;
        pool(embeddings, weights)
    }

    fn dimension(&self) -> usize {
        all_minilm_l6_v2::VECTOR_SIZE as usize
    }
}

/// Split a query that exceeds one embedding window; short queries stay whole.
pub fn query_pieces(text: &str) -> Result<Vec<String>> {
    if text.chars().count() <= all_minilm_l6_v2::MAX_QUERY_CHARS {
        return Ok(vec![text.to_string()]);
    }
    let pieces = splitter::split(text, all_minilm_l6_v2::MAX_QUERY_CHARS, 0)?;
    if pieces.is_empty() {
        return Ok(vec![text.to_string()]);
    }
    Ok(pieces)
}

pub fn piece_weights(pieces: &[String]) -> Vec<f32> {
    pieces.iter().map(|s| s.len() as f32).collect()
}

/// Combine piece embeddings into one query vector, weighted by piece length.
pub fn pool(mut embeddings: Vec<Vec<f32>>, weights: Vec<f32>) -> Result<Vec<f32>> {
    match embeddings.len() {
        0 => Err(Error::embedding("no embedding produced for query")),
        1 => Ok(embeddings.remove(0)),
        _ => vector_mean::mean(embeddings, weights),
    }
}
