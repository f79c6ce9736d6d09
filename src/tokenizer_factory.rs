use std::path::Path;
use tokenizers::tokenizer::Tokenizer;

use crate::error::{Error, Result};

/// Load `tokenizer.json` from a local embedding model directory.
pub fn get_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&tokenizer_path).map_err(|e| {
        Error::Config(format!(
            "failed to load tokenizer from {}: {}",
            tokenizer_path.display(),
            e
        ))
    })
}
