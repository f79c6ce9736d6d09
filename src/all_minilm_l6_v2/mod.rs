pub const MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const COLLECTION_NAME: &str = "all_minilm_l6_v2_docs";
pub const VECTOR_SIZE: u64 = 384; // all-MiniLM-L6-v2 embedding Size: 384 dimensions
pub const MAX_TOKENS_PER_CHUNK: usize = 256; // all-MiniLM-L6-v2 embedding model max tokens limit
/// Rough character budget for one embedding window; longer queries are pooled.
pub const MAX_QUERY_CHARS: usize = 4 * MAX_TOKENS_PER_CHUNK;
