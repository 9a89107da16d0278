//! BM25 lexical index over chunk text
//!
//! Mutations rebuild the ranking statistics wholesale; for the corpus
//! sizes this index serves, the O(n) rebuild is cheaper to get right than
//! incremental statistics. State snapshots to a JSON file after every
//! mutation so the index survives restarts.

use crate::error::Result;
use crate::index::chunker::parse_chunk_id;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

fn token_pattern() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static token pattern"))
}

/// Tokenize text for BM25: lowercase, strip punctuation, drop tokens
/// shorter than 2 characters
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = token_pattern().replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    doc_ids: Vec<String>,
    doc_texts: Vec<String>,
}

/// BM25 (Okapi) index over chunk ids and their raw text
pub struct LexicalIndex {
    doc_ids: Vec<String>,
    doc_texts: Vec<String>,
    doc_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f32,
    snapshot_path: Option<PathBuf>,
}

impl LexicalIndex {
    /// New empty index with no persistence
    pub fn new() -> Self {
        Self {
            doc_ids: Vec::new(),
            doc_texts: Vec::new(),
            doc_tokens: Vec::new(),
            doc_freq: HashMap::new(),
            avg_doc_len: 0.0,
            snapshot_path: None,
        }
    }

    /// Load the index from a snapshot file, starting empty when the file is
    /// missing or corrupt
    pub fn load(path: &Path) -> Self {
        let mut index = Self::new();
        index.snapshot_path = Some(path.to_path_buf());

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return index,
        };

        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) => {
                index.doc_tokens = snapshot.doc_texts.iter().map(|t| tokenize(t)).collect();
                index.doc_ids = snapshot.doc_ids;
                index.doc_texts = snapshot.doc_texts;
                index.rebuild();
                debug!("Loaded lexical index: {} chunks", index.len());
            }
            Err(e) => {
                warn!(
                    "Corrupt lexical index snapshot at {}; starting empty: {}",
                    path.display(),
                    e
                );
            }
        }

        index
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Add chunks; ids already present are skipped (idempotent)
    pub fn add(&mut self, ids: &[String], texts: &[String]) -> Result<()> {
        let existing: HashSet<String> = self.doc_ids.iter().cloned().collect();
        let mut added = false;

        for (id, text) in ids.iter().zip(texts.iter()) {
            if existing.contains(id) {
                continue;
            }
            self.doc_tokens.push(tokenize(text));
            self.doc_ids.push(id.clone());
            self.doc_texts.push(text.clone());
            added = true;
        }

        if added {
            self.rebuild();
        }
        self.save()
    }

    /// Remove chunks by id
    pub fn remove(&mut self, ids: &[String]) -> Result<()> {
        let to_remove: HashSet<&String> = ids.iter().collect();
        let mut kept_ids = Vec::new();
        let mut kept_texts = Vec::new();
        let mut kept_tokens = Vec::new();

        for (i, id) in self.doc_ids.iter().enumerate() {
            if !to_remove.contains(id) {
                kept_ids.push(id.clone());
                kept_texts.push(self.doc_texts[i].clone());
                kept_tokens.push(self.doc_tokens[i].clone());
            }
        }

        self.doc_ids = kept_ids;
        self.doc_texts = kept_texts;
        self.doc_tokens = kept_tokens;
        self.rebuild();
        self.save()
    }

    /// Remove every chunk belonging to a file
    pub fn remove_file(&mut self, file_path: &str) -> Result<()> {
        let ids: Vec<String> = self
            .doc_ids
            .iter()
            .filter(|id| {
                parse_chunk_id(id)
                    .map(|(path, _, _)| path == file_path)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        if ids.is_empty() {
            return Ok(());
        }
        self.remove(&ids)
    }

    /// Clear all chunks
    pub fn clear(&mut self) -> Result<()> {
        self.doc_ids.clear();
        self.doc_texts.clear();
        self.doc_tokens.clear();
        self.rebuild();
        self.save()
    }

    /// Ranked `(id, score)` search; empty for an empty corpus or a query
    /// that tokenizes to nothing
    pub fn search(&self, query: &str, n: usize) -> Vec<(String, f32)> {
        if self.is_empty() {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let total_docs = self.doc_tokens.len() as f32;
        let mut scored: Vec<(String, f32)> = self
            .doc_tokens
            .iter()
            .enumerate()
            .map(|(i, tokens)| {
                let doc_len = tokens.len() as f32;
                let mut tf: HashMap<&str, f32> = HashMap::new();
                for t in tokens {
                    *tf.entry(t.as_str()).or_insert(0.0) += 1.0;
                }

                let mut score = 0.0;
                for term in &query_tokens {
                    let freq = match tf.get(term.as_str()) {
                        Some(f) => *f,
                        None => continue,
                    };
                    let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
                    let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let numerator = freq * (BM25_K1 + 1.0);
                    let denominator = freq
                        + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc_len / self.avg_doc_len.max(1.0)));
                    score += idf * (numerator / denominator);
                }

                (self.doc_ids[i].clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(n);
        scored
    }

    /// The raw text stored for a chunk id
    pub fn text_of(&self, id: &str) -> Option<&str> {
        self.doc_ids
            .iter()
            .position(|d| d == id)
            .map(|i| self.doc_texts[i].as_str())
    }

    /// Scan stored texts for an exact (case-insensitive) substring, restricted
    /// to a set of file paths when given
    pub fn scan_containing(
        &self,
        needle: &str,
        limit: usize,
        file_scope: Option<&HashSet<String>>,
    ) -> Vec<(String, String)> {
        let needle_lower = needle.to_lowercase();
        let mut matches = Vec::new();

        for (i, text) in self.doc_texts.iter().enumerate() {
            if matches.len() >= limit {
                break;
            }

            if let Some(scope) = file_scope {
                let in_scope = parse_chunk_id(&self.doc_ids[i])
                    .map(|(path, _, _)| scope.contains(&path))
                    .unwrap_or(false);
                if !in_scope {
                    continue;
                }
            }

            if text.to_lowercase().contains(&needle_lower) {
                matches.push((self.doc_ids[i].clone(), text.clone()));
            }
        }

        matches
    }

    /// Recompute document frequencies and average length over the corpus
    fn rebuild(&mut self) {
        self.doc_freq.clear();
        let mut total_len = 0usize;

        for tokens in &self.doc_tokens {
            total_len += tokens.len();
            let unique: HashSet<&String> = tokens.iter().collect();
            for token in unique {
                *self.doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }

        self.avg_doc_len = if self.doc_tokens.is_empty() {
            0.0
        } else {
            total_len as f32 / self.doc_tokens.len() as f32
        };
    }

    /// Persist the snapshot if a path is configured
    fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let snapshot = Snapshot {
            doc_ids: self.doc_ids.clone(),
            doc_texts: self.doc_texts.clone(),
        };
        std::fs::write(path, serde_json::to_string(&snapshot)?)?;
        Ok(())
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids_and_texts() -> (Vec<String>, Vec<String>) {
        let ids = vec![
            "/docs/a.txt::loc1::chunk0".to_string(),
            "/docs/b.txt::loc1::chunk0".to_string(),
            "/docs/c.txt::loc2::chunk0".to_string(),
        ];
        let texts = vec![
            "the trial enrolled adult patients with psoriasis".to_string(),
            "dosing schedule for the investigational product".to_string(),
            "Exclusion Criteria include prior biologic therapy".to_string(),
        ];
        (ids, texts)
    }

    #[test]
    fn test_tokenize_rules() {
        let tokens = tokenize("The BM25-Index, v2.0!");
        assert_eq!(tokens, vec!["the", "bm25", "index", "v2"]);
    }

    #[test]
    fn test_empty_corpus_and_empty_query() {
        let mut index = LexicalIndex::new();
        assert!(index.search("anything", 5).is_empty());

        let (ids, texts) = ids_and_texts();
        index.add(&ids, &texts).unwrap();
        assert!(index.search("!!", 5).is_empty());
        assert!(index.search("a", 5).is_empty());
    }

    #[test]
    fn test_search_ranks_matching_chunk_first() {
        let mut index = LexicalIndex::new();
        let (ids, texts) = ids_and_texts();
        index.add(&ids, &texts).unwrap();

        let results = index.search("dosing schedule", 3);
        assert_eq!(results[0].0, "/docs/b.txt::loc1::chunk0");
        assert!(results[0].1 > 0.0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut index = LexicalIndex::new();
        let (ids, texts) = ids_and_texts();
        index.add(&ids, &texts).unwrap();
        index.add(&ids, &texts).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_remove_file_filters_and_rebuilds() {
        let mut index = LexicalIndex::new();
        let (ids, texts) = ids_and_texts();
        index.add(&ids, &texts).unwrap();

        index.remove_file("/docs/b.txt").unwrap();
        assert_eq!(index.len(), 2);
        assert!(index
            .search("dosing schedule", 3)
            .iter()
            .all(|(id, _)| !id.starts_with("/docs/b.txt")));
    }

    #[test]
    fn test_clear_empties_index() {
        let mut index = LexicalIndex::new();
        let (ids, texts) = ids_and_texts();
        index.add(&ids, &texts).unwrap();

        index.clear().unwrap();
        assert!(index.is_empty());
        assert!(index.search("dosing", 3).is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lexical_index.json");

        let (ids, texts) = ids_and_texts();
        {
            let mut index = LexicalIndex::load(&path);
            index.add(&ids, &texts).unwrap();
        }

        let reloaded = LexicalIndex::load(&path);
        assert_eq!(reloaded.len(), 3);
        let results = reloaded.search("psoriasis patients", 3);
        assert_eq!(results[0].0, "/docs/a.txt::loc1::chunk0");
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lexical_index.json");
        std::fs::write(&path, "{not json").unwrap();

        let index = LexicalIndex::load(&path);
        assert!(index.is_empty());
    }

    #[test]
    fn test_scan_containing_respects_scope() {
        let mut index = LexicalIndex::new();
        let (ids, texts) = ids_and_texts();
        index.add(&ids, &texts).unwrap();

        let scope: HashSet<String> = ["/docs/c.txt".to_string()].into_iter().collect();
        let hits = index.scan_containing("exclusion criteria", 10, Some(&scope));
        assert_eq!(hits.len(), 1);
        assert!(hits[0].1.contains("Exclusion Criteria"));

        let wrong_scope: HashSet<String> = ["/docs/a.txt".to_string()].into_iter().collect();
        assert!(index
            .scan_containing("exclusion criteria", 10, Some(&wrong_scope))
            .is_empty());
    }
}
