//! Reranking support for search results

mod http_backend;

pub use http_backend::*;

use crate::config::RerankerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RerankResult {
    /// Index into the candidate list passed to `rerank`
    pub index: usize,
    pub score: f32,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score candidates against the query; an empty result means "keep the
    /// existing order" (the identity pass-through)
    async fn rerank(&self, query: &str, documents: Vec<String>) -> Result<Vec<RerankResult>>;

    fn model_name(&self) -> &str;
}

/// The "none" provider: keeps candidates in their existing order
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, _documents: Vec<String>) -> Result<Vec<RerankResult>> {
        Ok(Vec::new())
    }

    fn model_name(&self) -> &str {
        "none"
    }
}

pub fn create_reranker(config: &RerankerConfig) -> Result<Arc<dyn Reranker>> {
    match config.provider.as_str() {
        "none" => Ok(Arc::new(NoopReranker)),
        "http" => Ok(Arc::new(HttpReranker::new(config)?)),
        other => Err(Error::Config(format!(
            "Unknown reranker provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_reranker_keeps_existing_order() {
        let reranker = NoopReranker;
        let results = reranker
            .rerank("query", vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(reranker.model_name(), "none");
    }

    #[test]
    fn test_create_reranker_providers() {
        let mut config = RerankerConfig::default();
        assert_eq!(create_reranker(&config).unwrap().model_name(), "none");

        config.provider = "http".to_string();
        let reranker = create_reranker(&config).unwrap();
        assert_eq!(reranker.model_name(), config.model);

        config.provider = "bogus".to_string();
        assert!(create_reranker(&config).is_err());
    }
}
