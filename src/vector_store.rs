//! Persistent chunk/vector collection with top-k similarity search
//!
//! The collection is a single flat namespace: every upload is appended to it and
//! queries search across all ingested documents.

use async_trait::async_trait;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{Error, Result};

const COLLECTION_FILE: &str = "collection.json";

/// A chunk and its embedding as held by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: Uuid,
    pub text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append entries, creating the collection if needed. Returns once the
    /// entries are durable.
    async fn add(&self, chunks: Vec<StoredChunk>) -> Result<()>;

    /// Top `k` entries by cosine similarity, best first. Empty when the
    /// collection does not exist yet.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn len(&self) -> Result<usize>;

    /// Release the store at shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Pair chunks with their vectors and add them to the store.
pub async fn ingest(
    store: &dyn VectorStore,
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
) -> Result<usize> {
    if chunks.len() != vectors.len() {
        return Err(Error::vector_store(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    let entries: Vec<StoredChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(text, vector)| StoredChunk {
            id: Uuid::new_v4(),
            text,
            vector,
        })
        .collect();
    let count = entries.len();
    store.add(entries).await?;
    Ok(count)
}

/// Embed `question` with the same embedder used at ingest time and fetch the
/// `k` closest chunks.
pub async fn query(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    question: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let vector = embedder.embed_query(question).await?;
    store.search(&vector, k).await
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    dimension: Option<usize>,
    entries: Vec<StoredChunk>,
}

/// File-backed store: `<dir>/collection.json`, loaded once and kept in memory.
///
/// Writers hold the write lock across the in-memory append and the file rewrite,
/// so concurrent uploads are serialised.
pub struct LocalVectorStore {
    dir: PathBuf,
    collection: RwLock<Collection>,
}

impl LocalVectorStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(COLLECTION_FILE);
        let collection = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Collection>(&bytes).map_err(|e| {
                Error::vector_store(format!("corrupt collection at {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collection::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            "Opened local vector store at {} ({} chunks)",
            dir.display(),
            collection.entries.len()
        );
        Ok(Self {
            dir,
            collection: RwLock::new(collection),
        })
    }

    async fn persist(&self, collection: &Collection) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec(collection)?;
        let tmp = self.dir.join(format!("{COLLECTION_FILE}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.dir.join(COLLECTION_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, chunks: Vec<StoredChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut collection = self.collection.write().await;
        let dimension = collection.dimension.unwrap_or(chunks[0].vector.len());
        if let Some(bad) = chunks.iter().find(|c| c.vector.len() != dimension) {
            return Err(Error::vector_store(format!(
                "vector dimension {} does not match collection dimension {}",
                bad.vector.len(),
                dimension
            )));
        }

        let before = collection.entries.len();
        collection.dimension = Some(dimension);
        collection.entries.extend(chunks);
        if let Err(e) = self.persist(&collection).await {
            collection.entries.truncate(before);
            if before == 0 {
                collection.dimension = None;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let collection = self.collection.read().await;
        if let Some(dimension) = collection.dimension {
            if vector.len() != dimension {
                return Err(Error::vector_store(format!(
                    "query dimension {} does not match collection dimension {}",
                    vector.len(),
                    dimension
                )));
            }
        }

        let mut scored: Vec<ScoredChunk> = collection
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                text: entry.text.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.collection.read().await.entries.len())
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("Closed local vector store at {}", self.dir.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, vector: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: Uuid::new_v4(),
            text: text.to_string(),
            vector,
        }
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn missing_collection_searches_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path().join("db")).await.unwrap();
        assert!(store.search(&[1.0, 0.0], 4).await.unwrap().is_empty());
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(!dir.path().join("db").exists());
    }

    #[tokio::test]
    async fn search_ranks_closest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store
            .add(vec![
                entry("north", vec![0.0, 1.0, 0.0]),
                entry("east", vec![1.0, 0.0, 0.0]),
                entry("north-east", vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[0.1, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "north");
        assert_eq!(hits[1].text, "north-east");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn uploads_accumulate_and_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalVectorStore::open(dir.path()).await.unwrap();
            ingest(&store, vec!["a".into()], vec![vec![1.0, 0.0]]).await.unwrap();
            ingest(&store, vec!["b".into(), "c".into()], vec![vec![0.0, 1.0], vec![1.0, 1.0]])
                .await
                .unwrap();
            store.close().await.unwrap();
        }

        let reopened = LocalVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 3);
        let hits = reopened.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "b");
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        store.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store.add(vec![entry("b", vec![1.0, 0.0, 0.0])]).await;
        assert!(matches!(err, Err(Error::VectorStore(_))));
        assert!(store.search(&[1.0], 1).await.is_err());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ingest_requires_matching_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).await.unwrap();
        let err = ingest(&store, vec!["a".into(), "b".into()], vec![vec![1.0]]).await;
        assert!(matches!(err, Err(Error::VectorStore(_))));
    }
}
