use ndarray::{Array, Array2, Axis};
use ndarray_stats::SummaryStatisticsExt;

use crate::error::{Error, Result};

/// Weighted mean of equally sized embeddings, used to pool the pieces of a text
/// that does not fit in one embedding window.
pub fn mean(embeddings: Vec<Vec<f32>>, weights: Vec<f32>) -> Result<Vec<f32>> {
    let num_embeddings = embeddings.len();
    let embedding_dim = embeddings
        .first()
        .map(Vec::len)
        .ok_or_else(|| Error::embedding("cannot average zero embeddings"))?;
    if weights.len() != num_embeddings {
        return Err(Error::embedding(format!(
            "{} weights for {} embeddings",
            weights.len(),
            num_embeddings
        )));
    }

    let flat_embeddings: Vec<f32> = embeddings.into_iter().flatten().collect();
    let array = Array2::from_shape_vec((num_embeddings, embedding_dim), flat_embeddings)
        .map_err(|e| Error::embedding(format!("embeddings have mismatched dimensions: {e}")))?;

    let weights = Array::from_vec(weights);
    let mean_embedding = array
        .weighted_mean_axis(Axis(0), &weights)
        .map_err(|e| Error::embedding(format!("weighted mean failed: {e}")))?;

    let (v, _) = mean_embedding.into_raw_vec_and_offset();
    Ok(v)
}
