//! Ingest and answer workflows
//!
//! Upload: save -> extract -> chunk -> embed -> store.
//! Ask: retrieve -> retrieval-augmented answer, or the raw full-document
//! fallback when nothing is retrieved.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::extractor::TextExtractor;
use crate::generator::{self, Answer, Generator};
use crate::splitter::Chunker;
use crate::vector_store::{self, VectorStore};

/// Uploads wait here until they are indexed.
const STAGING_DIR: &str = ".incoming";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub upload_dir: PathBuf,
    pub top_k: usize,
    /// Document used by the raw fallback; the latest upload when unset.
    pub fallback_document: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub path: PathBuf,
    pub chunks: usize,
}

pub struct RagPipeline {
    settings: PipelineSettings,
    extractor: Arc<TextExtractor>,
    chunker: Arc<Chunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    latest_upload: RwLock<Option<PathBuf>>,
}

impl RagPipeline {
    pub fn new(
        settings: PipelineSettings,
        extractor: TextExtractor,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let latest = most_recent_upload(&settings.upload_dir);
        if let Some(path) = &latest {
            tracing::debug!("Most recent upload: {}", path.display());
        }
        Self {
            settings,
            extractor: Arc::new(extractor),
            chunker: Arc::new(chunker),
            embedder,
            store,
            generator,
            latest_upload: RwLock::new(latest),
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Write the upload into its own staging directory under the upload
    /// directory. The file keeps its client name there.
    async fn stage_upload(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let staging = self
            .settings
            .upload_dir
            .join(STAGING_DIR)
            .join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&staging).await?;
        let path = staging.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Ingest an uploaded file. It is moved to `<upload_dir>/<name>` only once
    /// ingestion succeeded, replacing any earlier file with that name.
    pub async fn ingest_upload(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
        let name = sanitize_filename(filename)?;
        let staged = self.stage_upload(&name, bytes).await?;
        tracing::info!("Staged upload {} ({} bytes)", staged.display(), bytes.len());

        let result = async {
            let report = self.ingest_file(&staged).await?;
            let path = self.settings.upload_dir.join(&name);
            tokio::fs::rename(&staged, &path).await?;
            Ok::<_, Error>(IngestReport { path, ..report })
        }
        .await;
        discard_staging(&staged).await;

        let report = result?;
        *self.latest_upload.write().await = Some(report.path.clone());
        Ok(report)
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let full_text = self.extract(path).await?;

        let chunker = Arc::clone(&self.chunker);
        let chunks = tokio::task::spawn_blocking(move || chunker.split(&full_text)).await??;
        if chunks.is_empty() {
            return Err(Error::extraction(format!(
                "no text could be extracted from {}",
                path.display()
            )));
        }
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!("Embedding chunk {}: {}", i + 1, preview(chunk, 200));
        }

        let vectors = self.embedder.embed_documents(chunks.clone()).await?;
        let count = vector_store::ingest(self.store.as_ref(), chunks, vectors).await?;
        tracing::info!("Extracted {} chunks from {}", count, path.display());

        Ok(IngestReport {
            path: path.to_path_buf(),
            chunks: count,
        })
    }

    /// Retrieval-augmented answer; falls back to the raw document path when the
    /// store returns nothing.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let docs = vector_store::query(
            self.store.as_ref(),
            self.embedder.as_ref(),
            question,
            self.settings.top_k,
        )
        .await?;

        tracing::debug!("Top relevant docs for question '{}':", question);
        for doc in &docs {
            tracing::debug!("{} ({:.3})", preview(&doc.text, 150), doc.score);
        }

        if docs.is_empty() {
            tracing::warn!("No relevant docs retrieved, falling back to raw method");
            return self.ask_raw(question).await;
        }

        generator::answer_with_context(self.generator.as_ref(), question, docs).await
    }

    /// Answer from the full text of the fallback document, bypassing retrieval.
    pub async fn ask_raw(&self, question: &str) -> Result<Answer> {
        let path = self.fallback_document().await?;
        let text = self.extract(&path).await?;
        generator::answer_raw(self.generator.as_ref(), question, &text).await
    }

    pub async fn fallback_document(&self) -> Result<PathBuf> {
        if let Some(path) = &self.settings.fallback_document {
            return Ok(path.clone());
        }
        self.latest_upload
            .read()
            .await
            .clone()
            .ok_or(Error::NoFallbackDocument)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || extractor.extract_text(&path)).await?
    }
}

/// Keep only the final path component of a client-supplied file name.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::Upload(format!("invalid file name '{filename}'")));
    }
    Ok(name.to_string())
}

async fn discard_staging(staged: &Path) {
    if let Some(dir) = staged.parent() {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            tracing::warn!("Failed to remove staging dir {}: {}", dir.display(), e);
        }
    }
}

/// Newest regular file in the upload directory, if any. Staged uploads live in
/// a subdirectory and are never picked.
pub fn most_recent_upload(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().ok()?, e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
