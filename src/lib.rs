//! archivist: local document indexing with hybrid retrieval
//!
//! Two subsystems do the heavy lifting:
//! - the indexing pipeline ([`index::IndexManager`]): incremental,
//!   concurrent, resumable jobs over a folder of documents
//! - the hybrid retriever ([`search::Retriever`]): vector + BM25 fusion
//!   with entity/filename scoping, section-aware expansion, and
//!   reranking
//!
//! Extraction, embedding, reranking, and the vector index are consumed
//! through traits ([`extract::Extractor`], [`embed::Embedder`],
//! [`rerank::Reranker`], [`store::VectorStore`]).

pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod index;
pub mod jobs;
pub mod progress;
pub mod rerank;
pub mod search;
pub mod store;

pub use error::{Error, Result};
