//! Service configuration, read from the environment (and an optional `.env`)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::all_minilm_l6_v2;
use crate::error::{Error, Result};
use crate::splitter::{ChunkSettings, ChunkSizer};

/// Secret API key; `Debug` output is redacted.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreBackend {
    Local,
    Qdrant,
}

impl FromStr for VectorStoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            other => Err(Error::Config(format!(
                "unknown VECTOR_STORE_BACKEND '{other}' (expected 'local' or 'qdrant')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Directory holding `onnx/model.onnx` and the tokenizer files; when unset the
    /// model is downloaded by fastembed.
    pub model_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    pub vector_store_dir: PathBuf,
    pub allowed_origin: String,
    pub max_upload_bytes: usize,
    pub retrieval_top_k: usize,
    pub fallback_document: Option<PathBuf>,
    pub chunking: ChunkSettings,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store_backend: VectorStoreBackend,
    pub qdrant: QdrantConfig,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let api_key = get("GROQ_API_KEY")
            .map(ApiKey::new)
            .ok_or_else(|| Error::Config("GROQ_API_KEY must be set".to_string()))?;

        let sizer = match get_or("CHUNK_SIZER", "characters").to_ascii_lowercase().as_str() {
            "characters" | "chars" => ChunkSizer::Characters,
            "tokens" => ChunkSizer::Tokens,
            other => {
                return Err(Error::Config(format!(
                    "unknown CHUNK_SIZER '{other}' (expected 'characters' or 'tokens')"
                )))
            }
        };

        let embedding = EmbeddingConfig {
            model_dir: get("EMBEDDING_MODEL_DIR").map(PathBuf::from),
            cache_dir: get("EMBEDDING_CACHE_DIR").map(PathBuf::from),
        };

        if sizer == ChunkSizer::Tokens && embedding.model_dir.is_none() {
            return Err(Error::Config(
                "CHUNK_SIZER=tokens needs EMBEDDING_MODEL_DIR for the tokenizer".to_string(),
            ));
        }

        let chunking = ChunkSettings {
            chunk_size: parse(&get, "CHUNK_SIZE", 1000)?,
            chunk_overlap: parse(&get, "CHUNK_OVERLAP", 100)?,
            sizer,
            tokenizer_dir: embedding.model_dir.clone(),
        };
        chunking.validate()?;

        let retrieval_top_k = parse(&get, "RETRIEVAL_TOP_K", 4)?;
        if retrieval_top_k == 0 {
            return Err(Error::Config("RETRIEVAL_TOP_K must be at least 1".to_string()));
        }

        Ok(Self {
            bind_addr: get_or("BIND_ADDR", "0.0.0.0:8000"),
            upload_dir: PathBuf::from(get_or("UPLOAD_DIR", "uploaded_files")),
            vector_store_dir: PathBuf::from(get_or("VECTOR_DB_DIR", "db")),
            allowed_origin: get_or("ALLOWED_ORIGIN", "http://localhost:5173"),
            max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            retrieval_top_k,
            fallback_document: get("FALLBACK_DOCUMENT").map(PathBuf::from),
            chunking,
            llm: LlmConfig {
                api_key,
                base_url: get_or("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
                model: get_or("LLM_MODEL", "llama3-8b-8192"),
                timeout_secs: parse(&get, "LLM_TIMEOUT_SECS", 120)?,
                max_retries: parse(&get, "LLM_MAX_RETRIES", 2)?,
            },
            embedding,
            vector_store_backend: get_or("VECTOR_STORE_BACKEND", "local").parse()?,
            qdrant: QdrantConfig {
                url: get_or("QDRANT_URL", "http://localhost:6334"),
                collection: get_or("QDRANT_COLLECTION", all_minilm_l6_v2::COLLECTION_NAME),
            },
        })
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_frontend() {
        let config = Config::from_lookup(lookup(&[("GROQ_API_KEY", "gsk_test")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.allowed_origin, "http://localhost:5173");
        assert_eq!(config.upload_dir, PathBuf::from("uploaded_files"));
        assert_eq!(config.vector_store_dir, PathBuf::from("db"));
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval_top_k, 4);
        assert_eq!(config.llm.model, "llama3-8b-8192");
        assert_eq!(config.vector_store_backend, VectorStoreBackend::Local);
        assert!(config.fallback_document.is_none());
    }

    #[test]
    fn api_key_is_required_and_redacted() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(Error::Config(_))
        ));

        let config = Config::from_lookup(lookup(&[("GROQ_API_KEY", "gsk_secret")])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("gsk_secret"));
        assert_eq!(config.llm.api_key.expose(), "gsk_secret");
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk() {
        let result = Config::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn token_sizing_needs_model_dir() {
        let result = Config::from_lookup(lookup(&[("GROQ_API_KEY", "k"), ("CHUNK_SIZER", "tokens")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn parses_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("VECTOR_STORE_BACKEND", "Qdrant"),
            ("RETRIEVAL_TOP_K", "8"),
            ("FALLBACK_DOCUMENT", "docs/manual.pdf"),
        ]))
        .unwrap();
        assert_eq!(config.vector_store_backend, VectorStoreBackend::Qdrant);
        assert_eq!(config.retrieval_top_k, 8);
        assert_eq!(config.fallback_document, Some(PathBuf::from("docs/manual.pdf")));

        let bad = Config::from_lookup(lookup(&[("GROQ_API_KEY", "k"), ("RETRIEVAL_TOP_K", "many")]));
        assert!(matches!(bad, Err(Error::Config(_))));
    }
}
