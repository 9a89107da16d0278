//! Vector store boundary
//!
//! The indexing pipeline and retriever consume this interface; the
//! on-disk index internals live behind it. [`QdrantStore`] is the
//! production implementation; [`MemoryVectorStore`] is an exact-cosine
//! in-process implementation used by tests and small corpora.

mod memory;
mod qdrant_impl;

pub use memory::MemoryVectorStore;
pub use qdrant_impl::QdrantStore;

use crate::error::Result;
use crate::index::chunker::Chunk;
use async_trait::async_trait;

/// A chunk as stored in the vector index
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Canonical chunk id: `{file_path}::loc{location}::chunk{index}`
    pub id: String,
    pub text: String,
    pub file_path: String,
    pub location_number: u32,
    pub chunk_index: u32,
}

/// A nearest-neighbor match with its cosine distance (lower is closer)
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub distance: f32,
}

/// Trait for vector stores
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add chunks with their embeddings; chunks and vectors are paired by
    /// position
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Nearest-neighbor search, optionally restricted to a set of files
    async fn search(
        &self,
        vector: &[f32],
        n: usize,
        file_filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Delete every chunk belonging to a file
    async fn delete_by_file(&self, file_path: &str) -> Result<()>;

    /// All unique file paths present in the index
    async fn list_files(&self) -> Result<Vec<String>>;

    /// All chunks at a specific file and location (page/slide)
    async fn get_by_file_and_location(
        &self,
        file_path: &str,
        location: u32,
    ) -> Result<Vec<StoredChunk>>;

    /// Total number of stored chunks
    async fn count(&self) -> Result<usize>;

    /// Drop all stored chunks and recreate the index
    async fn reset(&self) -> Result<()>;

    /// Vector dimension this store was opened with
    fn dimension(&self) -> usize;
}
