//! In-process vector store
//!
//! Exact cosine search over an in-memory map. Slower than a real index
//! past a few tens of thousands of chunks, but exact, dependency-free,
//! and good enough for tests and small corpora.

use super::{ScoredChunk, StoredChunk, VectorStore};
use crate::error::{Error, Result};
use crate::index::chunker::Chunk;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct MemoryVectorStore {
    dimension: usize,
    entries: RwLock<HashMap<String, (StoredChunk, Vec<f32>)>>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::VectorStore(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::VectorStore(format!(
                "Chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut entries = self.entries.write().expect("vector store lock poisoned");
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            self.check_dimension(vector)?;
            let stored = StoredChunk {
                id: chunk.id(),
                text: chunk.text.clone(),
                file_path: chunk.file_path.clone(),
                location_number: chunk.location_number,
                chunk_index: chunk.chunk_index,
            };
            entries.insert(stored.id.clone(), (stored, vector.clone()));
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        n: usize,
        file_filter: Option<&[String]>,
    ) -> Result<Vec<ScoredChunk>> {
        self.check_dimension(vector)?;

        let entries = self.entries.read().expect("vector store lock poisoned");
        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .filter(|(chunk, _)| match file_filter {
                Some(files) => files.iter().any(|f| f == &chunk.file_path),
                None => true,
            })
            .map(|(chunk, embedding)| ScoredChunk {
                chunk: chunk.clone(),
                distance: 1.0 - cosine_similarity(vector, embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(n);
        Ok(scored)
    }

    async fn delete_by_file(&self, file_path: &str) -> Result<()> {
        let mut entries = self.entries.write().expect("vector store lock poisoned");
        entries.retain(|_, (chunk, _)| chunk.file_path != file_path);
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().expect("vector store lock poisoned");
        let mut files: Vec<String> = entries
            .values()
            .map(|(chunk, _)| chunk.file_path.clone())
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn get_by_file_and_location(
        &self,
        file_path: &str,
        location: u32,
    ) -> Result<Vec<StoredChunk>> {
        let entries = self.entries.read().expect("vector store lock poisoned");
        let mut chunks: Vec<StoredChunk> = entries
            .values()
            .filter(|(chunk, _)| chunk.file_path == file_path && chunk.location_number == location)
            .map(|(chunk, _)| chunk.clone())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().expect("vector store lock poisoned").len())
    }

    async fn reset(&self) -> Result<()> {
        self.entries
            .write()
            .expect("vector store lock poisoned")
            .clear();
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
