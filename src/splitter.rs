use std::path::PathBuf;

use text_splitter::{ChunkConfig, TextSplitter};
use tokenizers::tokenizer::Tokenizer;

use crate::error::{Error, Result};
use crate::tokenizer_factory;

/// Unit in which chunk size and overlap are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSizer {
    Characters,
    /// Tokens of the embedding model's tokenizer
    Tokens,
}

#[derive(Debug, Clone)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sizer: ChunkSizer,
    pub tokenizer_dir: Option<PathBuf>,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            sizer: ChunkSizer::Characters,
            tokenizer_dir: None,
        }
    }
}

impl ChunkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("CHUNK_SIZE must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text into ordered, overlapping chunks of at most `chunk_size` units.
///
/// Text is split at the highest semantic level that fits (paragraphs, then
/// sentences, then words) by `text-splitter`.
pub struct Chunker {
    settings: ChunkSettings,
    tokenizer: Option<Tokenizer>,
}

impl Chunker {
    pub fn new(settings: ChunkSettings) -> Result<Self> {
        settings.validate()?;
        let tokenizer = match settings.sizer {
            ChunkSizer::Characters => None,
            ChunkSizer::Tokens => {
                let dir = settings.tokenizer_dir.as_deref().ok_or_else(|| {
                    Error::Config("token sizing needs a tokenizer directory".to_string())
                })?;
                Some(tokenizer_factory::get_tokenizer(dir)?)
            }
        };
        Ok(Self {
            settings,
            tokenizer,
        })
    }

    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        match &self.tokenizer {
            Some(tokenizer) => split_by_tokens(
                text,
                tokenizer,
                self.settings.chunk_size,
                self.settings.chunk_overlap,
            ),
            None => split(text, self.settings.chunk_size, self.settings.chunk_overlap),
        }
    }
}

/// Character-measured split.
pub fn split(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>> {
    let config = ChunkConfig::new(max_chars)
        .with_overlap(overlap)
        .map_err(|e| Error::Chunking(e.to_string()))?;
    let splitter = TextSplitter::new(config);
    Ok(splitter.chunks(text).map(|s| s.to_string()).collect())
}

pub fn split_by_tokens(
    text: &str,
    tokenizer: &Tokenizer,
    max_tokens: usize,
    overlap: usize,
) -> Result<Vec<String>> {
    let config = ChunkConfig::new(max_tokens)
        .with_sizer(tokenizer)
        .with_overlap(overlap)
        .map_err(|e| Error::Chunking(e.to_string()))?;
    let splitter = TextSplitter::new(config);
    Ok(splitter.chunks(text).map(|s| s.to_string()).collect())
}
