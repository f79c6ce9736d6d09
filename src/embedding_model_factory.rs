use fastembed::{
    read_file_to_bytes, EmbeddingModel, InitOptions, InitOptionsUserDefined, Pooling,
    TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use std::path::Path;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Load all-MiniLM-L6-v2, from a local model directory when configured, otherwise
/// through fastembed's model download/cache.
pub fn get_model(config: &EmbeddingConfig) -> Result<TextEmbedding> {
    match &config.model_dir {
        Some(dir) => load_from_dir(dir),
        None => {
            let mut options =
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
            if let Some(cache_dir) = &config.cache_dir {
                options = options.with_cache_dir(cache_dir.clone());
            }
            TextEmbedding::try_new(options).map_err(|e| Error::embedding(e.to_string()))
        }
    }
}

fn load_from_dir(base_path: &Path) -> Result<TextEmbedding> {
    let read = |path: &Path| {
        read_file_to_bytes(&path.to_path_buf()).map_err(|e| {
            Error::embedding(format!("failed to read {}: {}", path.display(), e))
        })
    };

    let onnx_bytes = read(&base_path.join("onnx").join("model.onnx"))?;
    let tokenizer_files = TokenizerFiles {
        tokenizer_file: read(&base_path.join("tokenizer.json"))?,
        config_file: read(&base_path.join("config.json"))?,
        special_tokens_map_file: read(&base_path.join("special_tokens_map.json"))?,
        tokenizer_config_file: read(&base_path.join("tokenizer_config.json"))?,
    };

    let user_model =
        UserDefinedEmbeddingModel::new(onnx_bytes, tokenizer_files).with_pooling(Pooling::Mean);

    TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
        .map_err(|e| Error::embedding(e.to_string()))
}
