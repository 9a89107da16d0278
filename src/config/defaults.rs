//! Default values for configuration

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default collection name
pub fn default_collection_name() -> String {
    "archivist_docs".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("ARCHIVIST_EMBEDDING_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding dimension (matches BAAI/bge-small-en-v1.5)
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default extensions picked up by the folder scan
pub fn default_index_extensions() -> Vec<String> {
    ["pdf", "pptx", "docx", "xlsx", "txt", "md"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Default number of parallel indexing workers
pub fn default_index_workers() -> usize {
    3
}

/// Default maximum file size in megabytes
pub fn default_max_file_size_mb() -> u64 {
    50
}

/// Default maximum chunks per file before a file is skipped
pub fn default_max_chunks_per_file() -> u32 {
    50
}

/// Default chunk size in whitespace tokens
pub fn default_chunk_size() -> usize {
    800
}

/// Default overlap in whitespace tokens
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default chunk size for PDFs (denser pages, larger windows)
pub fn default_pdf_chunk_size() -> usize {
    1000
}

/// Default overlap for PDFs
pub fn default_pdf_chunk_overlap() -> usize {
    250
}

/// Default chunk size for spreadsheets (sparse cell text, smaller windows)
pub fn default_sheet_chunk_size() -> usize {
    400
}

/// Default overlap for spreadsheets
pub fn default_sheet_chunk_overlap() -> usize {
    50
}

/// Default: hybrid (vector + BM25) search enabled
pub fn default_hybrid_enabled() -> bool {
    true
}

/// Default RRF damping constant
pub fn default_rrf_k() -> f32 {
    60.0
}

/// Default candidate pool multiplier for each retrieval leg
pub fn default_candidate_multiplier() -> usize {
    2
}

/// Default base candidate pool size before reranking
pub fn default_initial_results() -> usize {
    100
}

/// Default number of results kept after reranking
pub fn default_rerank_to() -> usize {
    10
}

/// Default adjacent-location expansion range
pub fn default_expansion_range() -> u32 {
    2
}

/// Default score assigned to expansion-added chunks
pub fn default_expansion_score() -> f32 {
    0.9
}

/// Default limit for the section-keyword substring scan
pub fn default_keyword_scan_limit() -> usize {
    20
}

/// Default reranker provider ("none" is a valid identity pass-through)
pub fn default_reranker_provider() -> String {
    "none".to_string()
}

/// Default reranker backend URL
pub fn default_reranker_backend_url() -> String {
    std::env::var("ARCHIVIST_RERANKER_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default reranker model
pub fn default_reranker_model() -> String {
    "BAAI/bge-reranker-base".to_string()
}

/// Default keywords marking a query as asking for a protocol document
pub fn default_protocol_keywords() -> Vec<String> {
    vec!["protocol".to_string(), "study protocol".to_string()]
}
