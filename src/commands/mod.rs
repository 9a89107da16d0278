//! CLI command implementations

mod index;
mod query;
mod status;

pub use index::*;
pub use query::*;
pub use status::*;

use crate::config::Config;
use crate::embed::create_embedder;
use crate::error::Result;
use crate::extract::ExtractorRegistry;
use crate::index::IndexManager;
use crate::jobs::JobStore;
use crate::rerank::create_reranker;
use crate::search::{LexicalIndex, Retriever};
use crate::store::{QdrantStore, VectorStore};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Opened handles shared by all commands
pub struct AppContext {
    pub config: Arc<Config>,
    pub manager: IndexManager,
    pub retriever: Retriever,
}

impl AppContext {
    /// Open every store and wire the manager and retriever
    ///
    /// Provider misconfiguration fails here, before any job state is
    /// touched.
    pub async fn open(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let embedder = create_embedder(&config.embedding)?;
        let reranker = create_reranker(&config.reranker)?;

        let store: Arc<dyn VectorStore> =
            Arc::new(QdrantStore::connect(&config, embedder.dimension()).await?);
        let jobs = JobStore::open(&config.paths.db_file).await?;
        let lexical = Arc::new(Mutex::new(LexicalIndex::load(&config.paths.lexical_file)));
        let extractors = Arc::new(ExtractorRegistry::with_defaults());

        let manager = IndexManager::new(
            config.clone(),
            store.clone(),
            jobs,
            lexical.clone(),
            embedder.clone(),
            extractors,
        )?;

        let retriever = Retriever::new(config.clone(), store, lexical, embedder, reranker);

        Ok(Self {
            config,
            manager,
            retriever,
        })
    }
}
