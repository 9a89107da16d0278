//! Hybrid retrieval
//!
//! Query-time pipeline over the vector store, lexical index, and
//! reranker. Stages, each of which may short-circuit the rest: exact
//! filename scoping, entity-hint scoping, vector + BM25 fusion,
//! section-keyword augmentation, adjacent-location expansion, the
//! confusable-section filter, reranking, and deterministic final
//! ordering.

pub mod bm25;
pub mod fusion;
pub mod hints;

pub use bm25::{tokenize, LexicalIndex};
pub use fusion::{normalize_scores, reciprocal_rank_fusion};

use crate::config::Config;
use crate::embed::Embedder;
use crate::error::Result;
use crate::extract::{file_extension, location_unit};
use crate::index::chunker::{file_name_of, parse_chunk_id};
use crate::rerank::Reranker;
use crate::store::{ScoredChunk, VectorStore};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// One retrieved chunk, ready for display or context assembly
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub file_path: String,
    pub file_name: String,
    pub location_number: u32,
    pub chunk_index: u32,
    pub score: f32,
}

impl SearchHit {
    fn from_scored(scored: ScoredChunk) -> Self {
        let score = 1.0 - scored.distance;
        Self {
            text: scored.chunk.text,
            file_name: file_name_of(&scored.chunk.file_path),
            file_path: scored.chunk.file_path,
            location_number: scored.chunk.location_number,
            chunk_index: scored.chunk.chunk_index,
            score,
        }
    }

    fn from_chunk_id(id: &str, text: String, score: f32) -> Option<Self> {
        let (file_path, location_number, chunk_index) = parse_chunk_id(id)?;
        Some(Self {
            text,
            file_name: file_name_of(&file_path),
            file_path,
            location_number,
            chunk_index,
            score,
        })
    }

    /// Identity used when merging result lists: one entry per (file,
    /// location)
    fn location_key(&self) -> String {
        format!("{}::{}", self.file_path, self.location_number)
    }
}

/// A file matched by name search
#[derive(Debug, Clone, Serialize)]
pub struct FileMatch {
    pub file_path: String,
    pub file_name: String,
}

/// Scale the candidate pool with corpus size so the reranker keeps
/// seeing enough relevant chunks as the index grows
pub fn scaled_initial_results(chunk_count: usize, base: usize) -> usize {
    if chunk_count < 1_000 {
        base
    } else if chunk_count < 5_000 {
        base.max(150)
    } else if chunk_count < 10_000 {
        base.max(200)
    } else {
        base.max(250)
    }
}

/// Hybrid retriever over dependency-injected store handles
pub struct Retriever {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    lexical: Arc<Mutex<LexicalIndex>>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
}

impl Retriever {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn VectorStore>,
        lexical: Arc<Mutex<LexicalIndex>>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
    ) -> Self {
        Self {
            config,
            store,
            lexical,
            embedder,
            reranker,
        }
    }

    /// Search indexed documents for content matching the query
    ///
    /// Embedding or vector-store failures propagate; a missing or empty
    /// lexical index degrades gracefully to vector-only ranking.
    pub async fn search_documents(&self, query: &str, n: usize) -> Result<Vec<SearchHit>> {
        let indexed_files = self.store.list_files().await?;
        let chunk_count = self.store.count().await?;
        let initial = scaled_initial_results(chunk_count, self.config.search.initial_results);

        // Stage (a): explicit filename wins over every heuristic
        if let Some(exact_file) = hints::exact_filename_match(query, &indexed_files) {
            debug!("Query names {} explicitly; scoping to it", exact_file);
            let scope = vec![exact_file];
            let results = self.hybrid_search(query, initial, Some(&scope)).await?;
            return self.apply_reranker(query, results, n).await;
        }

        // Stage (b): entity hints, intersected with the protocol keyword
        let (patterns, is_protocol) = hints::extract_file_hints(query, &self.config.hints);
        if !patterns.is_empty() {
            let matching = hints::hint_matching_files(&indexed_files, &patterns, is_protocol);
            if !matching.is_empty() {
                debug!("Entity hints scope query to {} files", matching.len());
                let results = self.hybrid_search(query, initial, Some(&matching)).await?;
                return self.apply_reranker(query, results, n).await;
            }
        }

        let results = self.hybrid_search(query, initial, None).await?;
        self.apply_reranker(query, results, n).await
    }

    /// Stage (c): vector + BM25 fusion over the same file scope
    async fn hybrid_search(
        &self,
        query: &str,
        n: usize,
        file_scope: Option<&[String]>,
    ) -> Result<Vec<SearchHit>> {
        let fetch = n * self.config.search.candidate_multiplier;

        let query_vector = self.embedder.embed_query(query).await?;
        let vector_results = self.store.search(&query_vector, fetch, file_scope).await?;

        let vector_ranked: Vec<(String, f32)> = vector_results
            .iter()
            .map(|r| (r.chunk.id.clone(), 1.0 - r.distance))
            .collect();

        let mut hits_by_id: HashMap<String, SearchHit> = vector_results
            .into_iter()
            .map(|r| (r.chunk.id.clone(), SearchHit::from_scored(r)))
            .collect();

        let lexical_ranked = if self.config.search.hybrid_enabled {
            let lexical = self.lexical.lock().await;
            if lexical.is_empty() {
                None
            } else {
                let mut results = lexical.search(query, fetch);
                if let Some(scope) = file_scope {
                    results.retain(|(id, _)| {
                        parse_chunk_id(id)
                            .map(|(path, _, _)| scope.iter().any(|f| f == &path))
                            .unwrap_or(false)
                    });
                }

                let ranked = normalize_scores(results);
                // Lexical-only candidates materialize from the snapshot text
                for (id, score) in &ranked {
                    if !hits_by_id.contains_key(id) {
                        if let Some(hit) = lexical
                            .text_of(id)
                            .and_then(|text| SearchHit::from_chunk_id(id, text.to_string(), *score))
                        {
                            hits_by_id.insert(id.clone(), hit);
                        }
                    }
                }
                Some(ranked)
            }
        } else {
            None
        };

        let ordered_ids: Vec<String> = match lexical_ranked {
            Some(lexical_ranked) if !lexical_ranked.is_empty() => {
                let fused = reciprocal_rank_fusion(
                    &[vector_ranked, lexical_ranked],
                    self.config.search.rrf_k,
                );
                fused.into_iter().take(n).map(|(id, _)| id).collect()
            }
            // Vector-only fallback keeps the nearest-neighbor order
            _ => vector_ranked.into_iter().take(n).map(|(id, _)| id).collect(),
        };

        Ok(ordered_ids
            .into_iter()
            .filter_map(|id| hits_by_id.remove(&id))
            .collect())
    }

    /// Stage (g): pluggable reranking; an empty reranker response means
    /// "keep the existing order" and truncates
    async fn apply_reranker(
        &self,
        query: &str,
        mut results: Vec<SearchHit>,
        top_n: usize,
    ) -> Result<Vec<SearchHit>> {
        if results.is_empty() {
            return Ok(results);
        }

        let documents: Vec<String> = results.iter().map(|r| r.text.clone()).collect();
        let mut reranked = self.reranker.rerank(query, documents).await?;

        if reranked.is_empty() {
            results.truncate(top_n);
            return Ok(results);
        }

        reranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut ordered = Vec::new();
        for item in reranked {
            if let Some(hit) = results.get(item.index) {
                let mut hit = hit.clone();
                hit.score = item.score;
                ordered.push(hit);
            }
        }

        ordered.truncate(top_n);
        Ok(ordered)
    }

    /// Assemble the attributed context string for a query
    pub async fn get_context_for_query(&self, query: &str, n: usize) -> Result<String> {
        let query_lower = query.to_lowercase();
        let search = &self.config.search;

        let matching_sections: Vec<_> = self
            .config
            .hints
            .sections
            .iter()
            .filter(|s| query_lower.contains(s.trigger.as_str()))
            .collect();

        // A query naming several sections needs room for each of them
        let n_results = if matching_sections.len() > 1 {
            n.max(matching_sections.len() * 5)
        } else {
            n
        };

        let mut results = self.search_documents(query, search.rerank_to).await?;

        let relevant_files = self.relevant_files(query, &results).await?;

        if !matching_sections.is_empty() {
            // Stage (d): exact section-header hits are verified matches and
            // go ahead of the semantic approximations
            let lexical = self.lexical.lock().await;
            for section in &matching_sections {
                let keyword_hits: Vec<SearchHit> = lexical
                    .scan_containing(
                        &section.header,
                        search.keyword_scan_limit,
                        Some(&relevant_files),
                    )
                    .into_iter()
                    .filter_map(|(id, text)| SearchHit::from_chunk_id(&id, text, 1.0))
                    .collect();
                results = merge_keyword_first(keyword_hits, results);
            }
            drop(lexical);

            // Stage (e): multi-page sections split across location
            // boundaries; pull in the neighbors at a discounted score
            results = self.expand_adjacent(results, &relevant_files).await?;
        }

        // Stage (f)
        results = self.filter_confusable_sections(results, &query_lower);

        results.truncate(n_results);

        if results.is_empty() {
            return Ok("No relevant documents found.".to_string());
        }

        // Stage (h): deterministic final ordering
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.location_number.cmp(&b.location_number))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });

        let mut parts = Vec::with_capacity(results.len());
        for (i, hit) in results.iter().enumerate() {
            let ext = file_extension(Path::new(&hit.file_path));
            parts.push(format!(
                "[Document {}]\nSource: {} ({} {})\nContent: {}\n",
                i + 1,
                hit.file_name,
                location_unit(&ext),
                hit.location_number,
                hit.text
            ));
        }

        Ok(parts.join("\n---\n"))
    }

    /// The file scope section scans and expansion operate within: hint
    /// files when the query names an entity, else the result files
    async fn relevant_files(
        &self,
        query: &str,
        results: &[SearchHit],
    ) -> Result<HashSet<String>> {
        let (patterns, is_protocol) = hints::extract_file_hints(query, &self.config.hints);

        if !patterns.is_empty() {
            let indexed_files = self.store.list_files().await?;
            let matching = hints::hint_matching_files(&indexed_files, &patterns, is_protocol);
            if !matching.is_empty() {
                return Ok(matching.into_iter().collect());
            }
        }

        Ok(results.iter().map(|r| r.file_path.clone()).collect())
    }

    /// Stage (e): fetch chunks at location +/- the expansion range
    async fn expand_adjacent(
        &self,
        results: Vec<SearchHit>,
        relevant_files: &HashSet<String>,
    ) -> Result<Vec<SearchHit>> {
        let range = self.config.search.expansion_range as i64;
        let score = self.config.search.expansion_score;

        let mut seen: HashSet<String> = results.iter().map(|r| r.location_key()).collect();
        let mut expanded = results.clone();

        for hit in &results {
            if !relevant_files.contains(&hit.file_path) {
                continue;
            }

            for offset in -range..=range {
                if offset == 0 {
                    continue;
                }
                let adjacent = hit.location_number as i64 + offset;
                if adjacent < 1 {
                    continue;
                }

                let key = format!("{}::{}", hit.file_path, adjacent);
                if seen.contains(&key) {
                    continue;
                }

                let chunks = self
                    .store
                    .get_by_file_and_location(&hit.file_path, adjacent as u32)
                    .await?;
                for chunk in chunks {
                    if seen.insert(key.clone()) {
                        let mut neighbor = SearchHit::from_scored(ScoredChunk {
                            chunk,
                            distance: 0.0,
                        });
                        neighbor.score = score;
                        expanded.push(neighbor);
                    }
                }
            }
        }

        Ok(expanded)
    }

    /// Stage (f): a query naming one of two commonly-confused sections
    /// drops chunks that contain only the other section's header
    fn filter_confusable_sections(
        &self,
        mut results: Vec<SearchHit>,
        query_lower: &str,
    ) -> Vec<SearchHit> {
        for pair in &self.config.hints.confusable_pairs {
            let first_header = match self.config.hints.section_header(&pair.first) {
                Some(h) => h.to_lowercase(),
                None => continue,
            };
            let second_header = match self.config.hints.section_header(&pair.second) {
                Some(h) => h.to_lowercase(),
                None => continue,
            };

            let has_first = query_lower.contains(pair.first.as_str());
            let has_second = query_lower.contains(pair.second.as_str());

            if has_first && !has_second {
                results.retain(|r| {
                    let text = r.text.to_lowercase();
                    !text.contains(&second_header) || text.contains(&first_header)
                });
            } else if has_second && !has_first {
                results.retain(|r| {
                    let text = r.text.to_lowercase();
                    !text.contains(&first_header) || text.contains(&second_header)
                });
            }
        }

        results
    }

    /// Match indexed files by name/path pattern
    pub async fn search_files_by_name(&self, query: &str) -> Result<Vec<FileMatch>> {
        let indexed_files = self.store.list_files().await?;
        let terms = hints::file_search_terms(query);

        let matches = indexed_files
            .into_iter()
            .filter(|file_path| {
                let path_lower = file_path.to_lowercase();
                let path_normalized = hints::normalize_for_match(file_path);
                terms
                    .iter()
                    .any(|t| path_lower.contains(t.as_str()) || path_normalized.contains(t.as_str()))
            })
            .map(|file_path| FileMatch {
                file_name: file_name_of(&file_path),
                file_path,
            })
            .collect();

        Ok(matches)
    }

    /// Unique files matching a query, each with its best excerpt
    pub async fn unique_files_for_query(&self, query: &str, n: usize) -> Result<Vec<SearchHit>> {
        let results = self.search_documents(query, n).await?;

        let mut seen = HashSet::new();
        Ok(results
            .into_iter()
            .filter(|r| seen.insert(r.file_path.clone()))
            .collect())
    }
}

/// Merge keyword hits ahead of semantic hits, one entry per (file,
/// location)
fn merge_keyword_first(keyword_hits: Vec<SearchHit>, semantic: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for hit in keyword_hits.into_iter().chain(semantic) {
        if seen.insert(hit.location_key()) {
            merged.push(hit);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Result as CrateResult;
    use crate::index::chunker::Chunk;
    use crate::rerank::NoopReranker;
    use crate::store::MemoryVectorStore;
    use async_trait::async_trait;

    const DIM: usize = 16;

    /// Deterministic bag-of-tokens embedder: shared vocabulary puts
    /// related texts close in cosine space
    #[derive(Debug)]
    struct HashEmbedder;

    fn hash_token(token: &str) -> usize {
        token.bytes().fold(7usize, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(b as usize)
        }) % DIM
    }

    fn embed_text(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        for token in tokenize(text) {
            vector[hash_token(&token)] += 1.0;
        }
        vector
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, texts: Vec<String>) -> CrateResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| embed_text(t)).collect())
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn model_name(&self) -> &str {
            "hash-embedder"
        }
    }

    fn chunk(path: &str, location: u32, index: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            file_path: path.to_string(),
            location_number: location,
            chunk_index: index,
        }
    }

    async fn retriever_with(chunks: Vec<Chunk>) -> Retriever {
        let config = Arc::new(Config::default());
        let store = Arc::new(MemoryVectorStore::new(DIM));
        let lexical = Arc::new(Mutex::new(LexicalIndex::new()));

        let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| embed_text(&c.text)).collect();
        store.add(&chunks, &vectors).await.unwrap();

        let ids: Vec<String> = chunks.iter().map(|c| c.id()).collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        lexical.lock().await.add(&ids, &texts).unwrap();

        Retriever::new(
            config,
            store,
            lexical,
            Arc::new(HashEmbedder),
            Arc::new(NoopReranker),
        )
    }

    fn protocol_corpus() -> Vec<Chunk> {
        vec![
            chunk(
                "/docs/EliLilly_Protocol.pdf",
                4,
                0,
                "Inclusion Criteria: adults aged 18 to 65 with moderate disease",
            ),
            chunk(
                "/docs/EliLilly_Protocol.pdf",
                5,
                0,
                "Exclusion Criteria: prior biologic exposure within 12 weeks",
            ),
            chunk(
                "/docs/EliLilly_Protocol.pdf",
                6,
                0,
                "Dosing begins at 50mg weekly with titration",
            ),
            chunk(
                "/docs/UCB_Protocol.pdf",
                2,
                0,
                "Exclusion Criteria: pregnancy or active infection",
            ),
            chunk(
                "/docs/UCB_Protocol.pdf",
                3,
                0,
                "Endpoint assessment occurs at week 16",
            ),
            chunk(
                "/docs/Lilly Investor Deck.pptx",
                1,
                0,
                "Quarterly revenue grew across the immunology portfolio",
            ),
        ]
    }

    #[tokio::test]
    async fn test_exact_filename_scopes_to_single_file() {
        let retriever = retriever_with(protocol_corpus()).await;

        let results = retriever
            .search_documents("what does UCB_Protocol.pdf say about endpoints", 10)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.file_path == "/docs/UCB_Protocol.pdf"));
    }

    #[tokio::test]
    async fn test_entity_hint_with_protocol_intersection() {
        let retriever = retriever_with(protocol_corpus()).await;

        let results = retriever
            .search_documents("exclusion criteria for Eli Lilly protocol", 10)
            .await
            .unwrap();

        assert!(!results.is_empty());
        // Hint + protocol keyword excludes both UCB and the Lilly deck
        assert!(results
            .iter()
            .all(|r| r.file_path == "/docs/EliLilly_Protocol.pdf"));
    }

    #[tokio::test]
    async fn test_entity_hint_without_protocol_keyword() {
        let retriever = retriever_with(protocol_corpus()).await;

        let results = retriever
            .search_documents("lilly revenue growth", 10)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert!(results
            .iter()
            .all(|r| hints::normalize_for_match(&r.file_path).contains("lilly")));
    }

    #[tokio::test]
    async fn test_hybrid_degrades_to_vector_only_when_lexical_empty() {
        let chunks = protocol_corpus();
        let config = Arc::new(Config::default());
        let store = Arc::new(MemoryVectorStore::new(DIM));
        let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| embed_text(&c.text)).collect();
        store.add(&chunks, &vectors).await.unwrap();

        let retriever = Retriever::new(
            config,
            store,
            Arc::new(Mutex::new(LexicalIndex::new())),
            Arc::new(HashEmbedder),
            Arc::new(NoopReranker),
        );

        let results = retriever
            .search_documents("dosing titration weekly", 3)
            .await
            .unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_context_contains_attribution_headers() {
        let retriever = retriever_with(protocol_corpus()).await;

        let context = retriever
            .get_context_for_query("endpoint assessment for ucb", 5)
            .await
            .unwrap();

        assert!(context.contains("[Document 1]"));
        assert!(context.contains("Source: UCB_Protocol.pdf (page"));
        assert!(context.contains("Content:"));
    }

    #[tokio::test]
    async fn test_context_empty_corpus_message() {
        let retriever = retriever_with(Vec::new()).await;
        let context = retriever.get_context_for_query("anything", 5).await.unwrap();
        assert_eq!(context, "No relevant documents found.");
    }

    #[tokio::test]
    async fn test_exclusion_query_drops_inclusion_only_chunks() {
        let retriever = retriever_with(protocol_corpus()).await;

        let context = retriever
            .get_context_for_query("exclusion criteria for Eli Lilly protocol", 10)
            .await
            .unwrap();

        assert!(context.contains("Exclusion Criteria"));
        assert!(!context.contains("Inclusion Criteria: adults"));
    }

    #[tokio::test]
    async fn test_expansion_stays_within_range_and_never_duplicates() {
        // Pages 3..9 of one protocol; a section-keyword query seeds page 5
        let mut chunks = Vec::new();
        for page in 3..=9u32 {
            let text = if page == 5 {
                "Exclusion Criteria: full listing begins here".to_string()
            } else {
                format!("continuation text for page {}", page)
            };
            chunks.push(chunk("/docs/EliLilly_Protocol.pdf", page, 0, &text));
        }
        let retriever = retriever_with(chunks).await;

        let context = retriever
            .get_context_for_query("exclusion criteria for eli lilly protocol", 20)
            .await
            .unwrap();

        // Locations within +/- 2 of a seed may appear; count each once
        for page in 3..=9 {
            let marker = format!("(page {})", page);
            let occurrences = context.matches(&marker).count();
            assert!(
                occurrences <= 1,
                "page {} appears {} times",
                page,
                occurrences
            );
        }
    }

    #[tokio::test]
    async fn test_search_files_by_name() {
        let retriever = retriever_with(protocol_corpus()).await;

        let matches = retriever
            .search_files_by_name("find all EliLilly files")
            .await
            .unwrap();
        assert!(matches
            .iter()
            .any(|m| m.file_name == "EliLilly_Protocol.pdf"));
        assert!(matches.iter().all(|m| {
            hints::normalize_for_match(&m.file_path).contains("lilly")
        }));
    }

    #[tokio::test]
    async fn test_unique_files_for_query_dedupes() {
        let retriever = retriever_with(protocol_corpus()).await;

        let results = retriever
            .unique_files_for_query("exclusion criteria", 10)
            .await
            .unwrap();

        let mut paths: Vec<&String> = results.iter().map(|r| &r.file_path).collect();
        paths.dedup();
        assert_eq!(paths.len(), results.len());
    }

    #[test]
    fn test_scaled_initial_results_tiers() {
        assert_eq!(scaled_initial_results(500, 100), 100);
        assert_eq!(scaled_initial_results(1_000, 100), 150);
        assert_eq!(scaled_initial_results(5_000, 100), 200);
        assert_eq!(scaled_initial_results(20_000, 100), 250);
        // A larger configured base is never reduced
        assert_eq!(scaled_initial_results(20_000, 300), 300);
    }

    #[test]
    fn test_merge_keyword_first_places_verified_hits_ahead() {
        let keyword = vec![SearchHit {
            text: "Exclusion Criteria".to_string(),
            file_path: "/docs/a.pdf".to_string(),
            file_name: "a.pdf".to_string(),
            location_number: 5,
            chunk_index: 0,
            score: 1.0,
        }];
        let semantic = vec![
            SearchHit {
                text: "semantic hit same location".to_string(),
                file_path: "/docs/a.pdf".to_string(),
                file_name: "a.pdf".to_string(),
                location_number: 5,
                chunk_index: 1,
                score: 0.8,
            },
            SearchHit {
                text: "semantic hit other location".to_string(),
                file_path: "/docs/a.pdf".to_string(),
                file_name: "a.pdf".to_string(),
                location_number: 7,
                chunk_index: 0,
                score: 0.7,
            },
        ];

        let merged = merge_keyword_first(keyword, semantic);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].score, 1.0);
        assert_eq!(merged[1].location_number, 7);
    }
}
