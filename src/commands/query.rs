//! Query commands: search, context assembly, file-name search

use super::AppContext;
use crate::error::Result;
use crate::extract::{file_extension, location_unit};
use crate::search::{FileMatch, SearchHit};
use std::path::Path;
use tracing::info;

/// Search indexed documents
pub async fn cmd_query(ctx: &AppContext, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    info!("Querying: {}", query);
    ctx.retriever.search_documents(query, limit).await
}

/// Assemble the attributed context string for a query
pub async fn cmd_context(ctx: &AppContext, query: &str, limit: usize) -> Result<String> {
    ctx.retriever.get_context_for_query(query, limit).await
}

/// Search indexed files by name/path pattern
pub async fn cmd_files(ctx: &AppContext, query: &str) -> Result<Vec<FileMatch>> {
    ctx.retriever.search_files_by_name(query).await
}

/// Print search results to console
pub fn print_search_results(query: &str, results: &[SearchHit]) {
    println!("\nQuery: {}\n", query);
    println!("Found {} results:\n", results.len());

    for (i, hit) in results.iter().enumerate() {
        let ext = file_extension(Path::new(&hit.file_path));
        println!(
            "{}. [score: {:.3}] {} ({} {})",
            i + 1,
            hit.score,
            hit.file_name,
            location_unit(&ext),
            hit.location_number
        );

        let preview: String = hit.text.chars().take(200).collect();
        let trailer = if hit.text.chars().count() > 200 { "..." } else { "" };
        println!("   {}{}\n", preview.replace('\n', " ").trim(), trailer);
    }
}

/// Print file matches to console
pub fn print_file_matches(matches: &[FileMatch]) {
    if matches.is_empty() {
        println!("No matching files.");
        return;
    }

    for m in matches {
        println!("{}\t{}", m.file_name, m.file_path);
    }
}
