//! Shared test fixtures: deterministic embedder, fixture extractors, and
//! a fully wired manager/retriever over the in-memory vector store.
#![allow(dead_code)]

use archivist::config::Config;
use archivist::embed::Embedder;
use archivist::error::Result;
use archivist::extract::{ExtractedDocument, ExtractedUnit, Extractor, ExtractorRegistry};
use archivist::index::IndexManager;
use archivist::jobs::JobStore;
use archivist::rerank::NoopReranker;
use archivist::search::{tokenize, LexicalIndex, Retriever};
use archivist::store::MemoryVectorStore;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

pub const DIM: usize = 16;

/// Marker that makes the fixture PDF extractor report image-only pages
pub const IMAGE_ONLY_MARKER: &str = "%%IMAGE_ONLY%%";

/// Deterministic bag-of-tokens embedder: texts sharing vocabulary land
/// close in cosine space, which is enough to drive retrieval tests
#[derive(Debug)]
pub struct HashEmbedder;

fn hash_token(token: &str) -> usize {
    token.bytes().fold(7usize, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(b as usize)
    }) % DIM
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for token in tokenize(text) {
        vector[hash_token(&token)] += 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Fixture extractor standing in for a real PDF parser: form feeds split
/// pages, and the image-only marker simulates a scanned document
pub struct FixturePdfExtractor;

impl Extractor for FixturePdfExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let content = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&content);

        if text.contains(IMAGE_ONLY_MARKER) {
            return Ok(ExtractedDocument {
                units: Vec::new(),
                image_only: true,
            });
        }

        let units = text
            .split('\x0c')
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| ExtractedUnit {
                location: (i + 1) as u32,
                text: page.trim().to_string(),
            })
            .collect();

        Ok(ExtractedDocument {
            units,
            image_only: false,
        })
    }

    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }
}

/// Extractor that always fails, for batch-continuation tests
pub struct FailingExtractor;

impl Extractor for FailingExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        Err(archivist::Error::Extract(format!(
            "simulated parser failure: {}",
            path.display()
        )))
    }

    fn extensions(&self) -> &[&'static str] {
        &["fail"]
    }
}

/// Everything an integration test needs, wired over temp storage
pub struct TestHarness {
    pub config: Arc<Config>,
    pub manager: IndexManager,
    pub retriever: Retriever,
    pub store: Arc<MemoryVectorStore>,
    pub docs_dir: std::path::PathBuf,
    _tmp: TempDir,
}

pub async fn harness(mut config: Config) -> TestHarness {
    let tmp = TempDir::new().unwrap();
    config.init_paths(Some(tmp.path().join("state")));
    let docs_dir = tmp.path().join("docs");
    std::fs::create_dir_all(&docs_dir).unwrap();

    let config = Arc::new(config);
    let store = Arc::new(MemoryVectorStore::new(DIM));
    let jobs = JobStore::open(&config.paths.db_file).await.unwrap();
    let lexical = Arc::new(Mutex::new(LexicalIndex::load(&config.paths.lexical_file)));
    let embedder = Arc::new(HashEmbedder);

    let mut registry = ExtractorRegistry::with_defaults();
    registry.register(Arc::new(FixturePdfExtractor));
    registry.register(Arc::new(FailingExtractor));

    let manager = IndexManager::new(
        config.clone(),
        store.clone(),
        jobs,
        lexical.clone(),
        embedder.clone(),
        Arc::new(registry),
    )
    .unwrap();

    let retriever = Retriever::new(
        config.clone(),
        store.clone(),
        lexical,
        embedder,
        Arc::new(NoopReranker),
    );

    TestHarness {
        config,
        manager,
        retriever,
        store,
        docs_dir,
        _tmp: tmp,
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
}
