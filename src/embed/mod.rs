//! Embedding generation
//!
//! An abstraction over embedding backends:
//! - A trait for different providers
//! - HTTP embedding backend
//! - Batch processing for efficiency

mod http_backend;

pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed(vec![text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("No embedding returned for query".to_string()))
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
///
/// A missing backend URL is a provider misconfiguration and fails here,
/// before any indexing job is created.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.backend_url.trim().is_empty() {
        return Err(Error::Config(
            "Embedding backend is not configured; set embedding.backend_url".to_string(),
        ));
    }

    let embedder = HttpEmbedder::new(config)?;
    Ok(Arc::new(embedder))
}

/// Helper to embed in batches
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size.max(1)) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let embeddings = embedder.embed(batch_texts).await?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}
