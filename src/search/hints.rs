//! Query scoping heuristics
//!
//! Filename and entity matching that narrows search scope before the
//! hybrid legs run. Matching is separator-insensitive: users type
//! "eli lilly protocol", paths say `EliLilly_Protocol.pdf`.

use crate::config::HintsConfig;
use std::path::Path;

/// Normalize a path or query fragment for matching: lowercase with
/// spaces, dashes, and underscores removed
pub fn normalize_for_match(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '-' && *c != '_')
        .collect()
}

/// Find an indexed file whose name or stem the query mentions explicitly
pub fn exact_filename_match(query: &str, indexed_files: &[String]) -> Option<String> {
    let query_lower = query.to_lowercase();
    let query_normalized = normalize_for_match(query);

    for file_path in indexed_files {
        let path = Path::new(file_path);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();
        let stem = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();

        if file_name.is_empty() {
            continue;
        }

        if query_lower.contains(&file_name) || query_lower.contains(&stem) {
            return Some(file_path.clone());
        }

        let normalized_name = normalize_for_match(&file_name);
        if query_normalized.contains(&normalized_name) {
            return Some(file_path.clone());
        }
    }

    None
}

/// Extract entity path hints from a query, plus whether the query asks for
/// a protocol document
pub fn extract_file_hints(query: &str, hints: &HintsConfig) -> (Vec<String>, bool) {
    let query_lower = query.to_lowercase();
    let mut patterns = Vec::new();

    let is_protocol_query = hints
        .protocol_keywords
        .iter()
        .any(|kw| query_lower.contains(kw.as_str()));

    for entity in &hints.entities {
        if query_lower.contains(entity.name.as_str()) {
            for p in &entity.patterns {
                if !patterns.contains(p) {
                    patterns.push(p.clone());
                }
            }
        }
    }

    (patterns, is_protocol_query)
}

/// Indexed files whose normalized path contains any hint pattern
///
/// A protocol query narrows further to paths also containing "protocol";
/// this is an intersection, not an OR.
pub fn hint_matching_files(
    indexed_files: &[String],
    patterns: &[String],
    is_protocol_query: bool,
) -> Vec<String> {
    let mut matching = Vec::new();

    for file_path in indexed_files {
        let normalized = normalize_for_match(file_path);
        if !patterns.iter().any(|p| normalized.contains(p.as_str())) {
            continue;
        }
        if is_protocol_query && !file_path.to_lowercase().contains("protocol") {
            continue;
        }
        matching.push(file_path.clone());
    }

    matching
}

/// Query terms for file-name search: words longer than 2 characters with
/// camelCase compounds split, minus listing stop-words
pub fn file_search_terms(query: &str) -> Vec<String> {
    const SKIP_TERMS: &[&str] = &[
        "give", "all", "files", "file", "show", "list", "find", "get", "the", "and", "for",
    ];

    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        if word.len() <= 2 {
            continue;
        }

        let lower = word.to_lowercase();
        if !terms.contains(&lower) {
            terms.push(lower);
        }

        for part in split_camel_case(word) {
            let part_lower = part.to_lowercase();
            if part_lower.len() >= 2 && !terms.contains(&part_lower) {
                terms.push(part_lower);
            }
        }
    }

    terms.retain(|t| !SKIP_TERMS.contains(&t.as_str()));
    terms
}

fn split_camel_case(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for c in word.chars() {
        if c.is_uppercase() && current.chars().last().is_some_and(|p| p.is_lowercase()) {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    if parts.len() > 1 {
        parts
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<String> {
        vec![
            "/docs/EliLilly_Protocol.pdf".to_string(),
            "/docs/UCB_Protocol.pdf".to_string(),
            "/docs/Lilly Investor Deck.pptx".to_string(),
            "/docs/site_budget.xlsx".to_string(),
        ]
    }

    #[test]
    fn test_exact_filename_match_by_stem() {
        let found = exact_filename_match("summarize site_budget for me", &files());
        assert_eq!(found.as_deref(), Some("/docs/site_budget.xlsx"));
    }

    #[test]
    fn test_exact_filename_match_separator_insensitive() {
        let found = exact_filename_match("what does elililly protocol.pdf say", &files());
        assert_eq!(found.as_deref(), Some("/docs/EliLilly_Protocol.pdf"));
    }

    #[test]
    fn test_exact_filename_no_match() {
        assert!(exact_filename_match("adverse events in phase 2", &files()).is_none());
    }

    #[test]
    fn test_extract_file_hints() {
        let hints = HintsConfig::default();

        let (patterns, is_protocol) =
            extract_file_hints("exclusion criteria for Eli Lilly protocol", &hints);
        assert_eq!(patterns, vec!["elililly".to_string(), "lilly".to_string()]);
        assert!(is_protocol);

        let (patterns, is_protocol) = extract_file_hints("ucb dosing schedule", &hints);
        assert_eq!(patterns, vec!["ucb".to_string()]);
        assert!(!is_protocol);
    }

    #[test]
    fn test_hint_matching_protocol_intersection() {
        let patterns = vec!["elililly".to_string(), "lilly".to_string()];

        // Without the protocol keyword both Lilly files match
        let matching = hint_matching_files(&files(), &patterns, false);
        assert_eq!(matching.len(), 2);

        // Protocol query narrows to the protocol document only
        let matching = hint_matching_files(&files(), &patterns, true);
        assert_eq!(matching, vec!["/docs/EliLilly_Protocol.pdf".to_string()]);
    }

    #[test]
    fn test_file_search_terms_splits_camel_case() {
        let terms = file_search_terms("find all EliLilly files");
        assert!(terms.contains(&"elililly".to_string()));
        assert!(terms.contains(&"eli".to_string()));
        assert!(terms.contains(&"lilly".to_string()));
        assert!(!terms.contains(&"find".to_string()));
        assert!(!terms.contains(&"all".to_string()));
    }
}
