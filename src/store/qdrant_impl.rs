//! Qdrant vector store implementation
//!
//! Wraps the Qdrant client behind the [`VectorStore`] trait: collection
//! management, point upsert/delete, and cosine search with file-scoped
//! filters.

use super::{ScoredChunk, StoredChunk, VectorStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::chunker::Chunk;
use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    GetCollectionInfoResponse, PointId, PointStruct, ScalarQuantizationBuilder,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Payload stored with every point
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkPayload {
    chunk_id: String,
    text: String,
    file_path: String,
    file_name: String,
    location_number: u32,
    chunk_index: u32,
    indexed_at: String,
}

impl ChunkPayload {
    fn into_stored(self) -> StoredChunk {
        StoredChunk {
            id: self.chunk_id,
            text: self.text,
            file_path: self.file_path,
            location_number: self.location_number,
            chunk_index: self.chunk_index,
        }
    }
}

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Connect using config and ensure the collection is ready
    pub async fn connect(config: &Config, dimension: usize) -> Result<Self> {
        let store = Self::new(&config.qdrant_url, &config.collection_name, dimension)?;
        store.ensure_collection().await?;
        Ok(store)
    }

    /// Create a store handle without touching the collection
    pub fn new(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::VectorStore(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Ensure the collection exists with the expected dimension
    ///
    /// A dimension mismatch means the collection was built by a different
    /// embedding model; its vectors are unusable, so the collection is
    /// reset rather than erroring out.
    pub async fn ensure_collection(&self) -> Result<()> {
        let exists = self.client.collection_exists(&self.collection).await?;

        if exists {
            if let Some(size) = self.collection_vector_size().await? {
                if size != self.dimension {
                    warn!(
                        "Collection '{}' has vector size {}, expected {}; resetting stale collection",
                        self.collection, size, self.dimension
                    );
                    self.client.delete_collection(&self.collection).await?;
                } else {
                    debug!("Collection {} already exists", self.collection);
                    return Ok(());
                }
            } else {
                return Ok(());
            }
        }

        info!(
            "Creating collection {} with dimension {}",
            self.collection, self.dimension
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .quantization_config(ScalarQuantizationBuilder::default()),
            )
            .await?;

        Ok(())
    }

    async fn collection_vector_size(&self) -> Result<Option<usize>> {
        let info = self.client.collection_info(&self.collection).await?;
        Ok(extract_vector_size(&info))
    }

    /// Stable point UUID derived from the chunk id string
    fn point_uuid(chunk_id: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
    }

    fn file_filter(files: &[String]) -> Filter {
        Filter::must([Condition::matches(
            "file_path",
            files.to_vec(),
        )])
    }

    /// Scroll every point matching a filter, collecting payloads
    async fn scroll_payloads(&self, filter: Option<Filter>) -> Result<Vec<(PointId, ChunkPayload)>> {
        let mut collected = Vec::new();
        let mut offset: Option<PointId> = None;
        let batch_size = 1000u32;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(true)
                .with_vectors(false);

            if let Some(ref f) = filter {
                builder = builder.filter(f.clone());
            }
            if let Some(ref o) = offset {
                builder = builder.offset(o.clone());
            }

            let response = self.client.scroll(builder).await?;
            if response.result.is_empty() {
                break;
            }

            for point in response.result {
                let Some(id) = point.id else { continue };
                let payload_json: Value = Value::Object(
                    point
                        .payload
                        .into_iter()
                        .map(|(k, v)| (k, json_from_qdrant_value(v)))
                        .collect(),
                );
                match serde_json::from_value::<ChunkPayload>(payload_json) {
                    Ok(payload) => collected.push((id, payload)),
                    Err(e) => warn!("Skipping point with malformed payload: {}", e),
                }
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(collected)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != vectors.len() {
            return Err(Error::VectorStore(format!(
                "Chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(mismatch) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::VectorStore(format!(
                "Vector dimension mismatch for collection '{}': expected {}, got {}",
                self.collection,
                self.dimension,
                mismatch.len()
            )));
        }

        debug!(
            "Upserting {} points to collection {}",
            chunks.len(),
            self.collection
        );

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let chunk_id = chunk.id();
            let payload = ChunkPayload {
                chunk_id: chunk_id.clone(),
                text: chunk.text.clone(),
                file_path: chunk.file_path.clone(),
                file_name: chunk.file_name(),
                location_number: chunk.location_number,
                chunk_index: chunk.chunk_index,
                indexed_at: Utc::now().to_rfc3339(),
            };
            let payload = Payload::try_from(serde_json::to_value(&payload)?)
                .map_err(|e| Error::VectorStore(e.to_string()))?;

            points.push(PointStruct::new(
                Self::point_uuid(&chunk_id).to_string(),
                vector.clone(),
                payload,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        n: usize,
        file_filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>> {
        debug!(
            "Searching collection {} with limit {}",
            self.collection, n
        );

        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector.to_vec(), n as u64)
                .with_payload(true);

        if let Some(files) = file_filter {
            builder = builder.filter(Self::file_filter(files));
        }

        let response = self.client.search_points(builder).await?;

        let mut results = Vec::with_capacity(response.result.len());
        for point in response.result {
            let payload_json: Value = Value::Object(
                point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect(),
            );
            let payload: ChunkPayload = serde_json::from_value(payload_json)
                .map_err(|e| Error::VectorStore(format!("Malformed point payload: {}", e)))?;

            // Qdrant reports cosine similarity; the trait contract is distance
            results.push(ScoredChunk {
                chunk: payload.into_stored(),
                distance: 1.0 - point.score,
            });
        }

        Ok(results)
    }

    async fn delete_by_file(&self, file_path: &str) -> Result<()> {
        let filter = Self::file_filter(&[file_path.to_string()]);
        let points = self.scroll_payloads(Some(filter)).await?;
        if points.is_empty() {
            return Ok(());
        }

        debug!(
            "Deleting {} points for {} from collection {}",
            points.len(),
            file_path,
            self.collection
        );

        let ids: Vec<PointId> = points.into_iter().map(|(id, _)| id).collect();
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(ids))
            .await?;
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let points = self.scroll_payloads(None).await?;
        let mut files: Vec<String> = points.into_iter().map(|(_, p)| p.file_path).collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn get_by_file_and_location(
        &self,
        file_path: &str,
        location: u32,
    ) -> Result<Vec<StoredChunk>> {
        let filter = Filter::must([
            Condition::matches("file_path", vec![file_path.to_string()]),
            Condition::matches("location_number", location as i64),
        ]);

        let points = self.scroll_payloads(Some(filter)).await?;
        let mut chunks: Vec<StoredChunk> =
            points.into_iter().map(|(_, p)| p.into_stored()).collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        let info = self.client.collection_info(&self.collection).await?;
        let count = info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0);
        Ok(count as usize)
    }

    async fn reset(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            info!("Deleting existing collection {}", self.collection);
            self.client.delete_collection(&self.collection).await?;
        }
        self.ensure_collection().await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn extract_vector_size(info: &GetCollectionInfoResponse) -> Option<usize> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;
    match vectors_config.config.as_ref()? {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => {
            Some(params.size as usize)
        }
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}

/// Convert Qdrant value to serde_json Value
fn json_from_qdrant_value(v: qdrant_client::qdrant::Value) -> Value {
    use qdrant_client::qdrant::value::Kind;

    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
