use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScalarQuantizationBuilder, SearchParamsBuilder,
    SearchPointsBuilder, SearchResponse, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;

use crate::config::QdrantConfig;
use crate::error::{Error, Result};
use crate::vector_store::{ScoredChunk, StoredChunk, VectorStore};

pub async fn collection_exists(qdrant_client: &Qdrant, collection_name: &str) -> Result<bool> {
    Ok(qdrant_client.collection_exists(collection_name).await?)
}

pub async fn create_collection_if_not_exists(
    qdrant_client: &Qdrant,
    collection_name: &str,
    vector_size: u64,
    distance: Distance,
) -> Result<()> {
    if collection_exists(qdrant_client, collection_name).await? {
        tracing::debug!("'{}' collection already exists in Qdrant", collection_name);
    } else {
        qdrant_client
            .create_collection(
                CreateCollectionBuilder::new(collection_name)
                    .vectors_config(VectorParamsBuilder::new(vector_size, distance))
                    .quantization_config(ScalarQuantizationBuilder::default()),
            )
            .await?;
        tracing::info!("created collection '{}' in Qdrant", collection_name);
    }
    Ok(())
}

pub async fn upsert_points(
    qdrant_client: &Qdrant,
    collection_name: &str,
    points: Vec<PointStruct>,
) -> Result<()> {
    qdrant_client
        .upsert_points(UpsertPointsBuilder::new(collection_name, points).wait(true))
        .await?;
    Ok(())
}

pub async fn search_points(
    qdrant_client: &Qdrant,
    collection_name: &str,
    embedding_vec: Vec<f32>,
    limit: u64,
) -> Result<SearchResponse> {
    let search_result = qdrant_client
        .search_points(
            SearchPointsBuilder::new(collection_name, embedding_vec, limit)
                .with_payload(true)
                .params(SearchParamsBuilder::default().exact(true)),
        )
        .await?;
    Ok(search_result)
}

/// Chunk text is kept in the `text` payload field.
pub fn to_point(chunk: StoredChunk) -> Result<PointStruct> {
    let payload = Payload::try_from(json!({ "text": chunk.text }))
        .map_err(|e| Error::vector_store(format!("invalid payload: {e}")))?;
    Ok(PointStruct::new(chunk.id.to_string(), chunk.vector, payload))
}

/// Collection hosted by a Qdrant server, an alternative to the on-disk store.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
    vector_size: u64,
}

impl QdrantVectorStore {
    pub fn connect(config: &QdrantConfig, vector_size: u64) -> Result<Self> {
        let client = Qdrant::from_url(&config.url).build()?;
        tracing::info!(
            "Using Qdrant at {} (collection '{}')",
            config.url,
            config.collection
        );
        Ok(Self {
            client,
            collection_name: config.collection.clone(),
            vector_size,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn add(&self, chunks: Vec<StoredChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        create_collection_if_not_exists(
            &self.client,
            &self.collection_name,
            self.vector_size,
            Distance::Cosine,
        )
        .await?;
        let points = chunks.into_iter().map(to_point).collect::<Result<Vec<_>>>()?;
        upsert_points(&self.client, &self.collection_name, points).await
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if !collection_exists(&self.client, &self.collection_name).await? {
            return Ok(Vec::new());
        }
        let response =
            search_points(&self.client, &self.collection_name, vector.to_vec(), k as u64).await?;
        Ok(response
            .result
            .into_iter()
            .map(|scored_point| ScoredChunk {
                text: scored_point
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                score: scored_point.score,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        if !collection_exists(&self.client, &self.collection_name).await? {
            return Ok(0);
        }
        let info = self.client.collection_info(&self.collection_name).await?;
        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or_default() as usize)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
