//! Indexing commands: index, reindex, resume, discard, recover

use super::AppContext;
use crate::error::{Error, Result};
use crate::index::{CancelToken, IndexOptions, IndexStats, ProgressFn, SkipCategory};
use crate::progress::{println_above_bars, status_spinner};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Progress callback that prints every line above the spinner and keeps
/// the spinner's message on the latest one
fn cli_progress(spinner: indicatif::ProgressBar) -> ProgressFn {
    Arc::new(move |message: &str| {
        for line in message.lines() {
            println_above_bars(line);
        }
        if let Some(last) = message.lines().last() {
            spinner.set_message(last.to_string());
        }
    })
}

/// Ctrl-C requests a pause: in-flight files finish, the job parks as
/// paused, and `archivist resume` picks it back up
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println_above_bars("Pause requested; finishing in-flight files...");
            handle.cancel();
        }
    });
    cancel
}

/// Index a folder as a new job
pub async fn cmd_index(
    ctx: &AppContext,
    folder: &Path,
    force: bool,
    max_chunks: Option<u32>,
) -> Result<IndexStats> {
    let spinner = status_spinner("Indexing...");
    let options = IndexOptions {
        force_reindex: force,
        max_chunks_per_file: max_chunks,
    };

    let stats = ctx
        .manager
        .index_folder(folder, &options, cli_progress(spinner.clone()), cancel_on_ctrl_c())
        .await;

    spinner.finish_and_clear();
    stats
}

/// Force-reindex specific files
pub async fn cmd_reindex(
    ctx: &AppContext,
    files: &[String],
    max_chunks: Option<u32>,
) -> Result<IndexStats> {
    if files.is_empty() {
        return Err(Error::Config("No files given to reindex".to_string()));
    }

    let spinner = status_spinner("Reindexing...");
    let options = IndexOptions {
        force_reindex: true,
        max_chunks_per_file: max_chunks,
    };

    let stats = ctx
        .manager
        .reindex_files(files, &options, cli_progress(spinner.clone()), cancel_on_ctrl_c())
        .await;

    spinner.finish_and_clear();
    stats
}

/// Resume the given job, or the active one when no id is given
pub async fn cmd_resume(ctx: &AppContext, job_id: Option<i64>) -> Result<IndexStats> {
    let job_id = match job_id {
        Some(id) => id,
        None => ctx
            .manager
            .job_store()
            .active_job()
            .await?
            .map(|j| j.id)
            .ok_or_else(|| Error::Config("No paused job to resume".to_string()))?,
    };

    let spinner = status_spinner("Resuming...");
    let stats = ctx
        .manager
        .resume_job(job_id, cli_progress(spinner.clone()), cancel_on_ctrl_c())
        .await;

    spinner.finish_and_clear();
    stats
}

/// Permanently discard a paused job's state
pub async fn cmd_discard(ctx: &AppContext, job_id: i64) -> Result<()> {
    ctx.manager.discard_job(job_id).await?;
    println!("Discarded job {}", job_id);
    Ok(())
}

/// Reprocess files previously skipped for exceeding the chunk ceiling
pub async fn cmd_recover(ctx: &AppContext, max_chunks: u32) -> Result<IndexStats> {
    let spinner = status_spinner("Recovering skipped files...");
    let stats = ctx
        .manager
        .recover_skipped(max_chunks, cli_progress(spinner.clone()), cancel_on_ctrl_c())
        .await;

    spinner.finish_and_clear();
    stats
}

/// Print a run's statistics
pub fn print_index_stats(stats: &IndexStats) {
    println!("\nIndexing run:");
    println!("  Files:            {}", stats.total_files);
    println!("  Indexed:          {}", stats.indexed_files);
    println!("  Unchanged:        {}", stats.skipped_unchanged);
    println!("  Skipped (limits): {}", stats.skipped_limits);
    if stats.removed_missing > 0 {
        println!("  Removed missing:  {}", stats.removed_missing);
    }
    println!("  Chunks:           {}", stats.total_chunks);
    println!("  Total time:       {:.1}s", stats.total_secs);
    println!("  Embed time:       {:.1}s", stats.total_embed_secs);

    for category in SkipCategory::ALL {
        let skips = stats.skipped_in(category);
        if skips.is_empty() {
            continue;
        }
        println!("\n  {} ({}):", category, skips.len());
        for skip in skips {
            match skip.chunks_would_be {
                Some(count) => println!("    {} ({} chunks)", skip.file_name, count),
                None => println!("    {}", skip.file_name),
            }
        }
    }

    if !stats.errors.is_empty() {
        warn!("{} files failed", stats.errors.len());
        println!("\n  Errors:");
        for error in &stats.errors {
            println!("    {}", error);
        }
    }
}
