//! Status command

use super::AppContext;
use crate::error::Result;
use crate::index::IndexStats;
use crate::jobs::IndexingJob;
use serde::Serialize;

/// A snapshot of system state for the status command
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub indexed_files: usize,
    pub total_chunks: u32,
    pub active_job: Option<IndexingJob>,
    pub last_run: Option<IndexStats>,
}

pub async fn cmd_status(ctx: &AppContext) -> Result<StatusReport> {
    let jobs = ctx.manager.job_store();

    let files = jobs.list_files().await?;
    let total_chunks = jobs.total_chunk_count().await?;
    let active_job = jobs.active_job().await?;
    let last_run = jobs.load_run_stats().await?;

    Ok(StatusReport {
        indexed_files: files.len(),
        total_chunks,
        active_job,
        last_run,
    })
}

pub fn print_status(report: &StatusReport) {
    println!("archivist status");
    println!("  Indexed files: {}", report.indexed_files);
    println!("  Chunks:        {}", report.total_chunks);

    match &report.active_job {
        Some(job) => {
            println!(
                "  Active job:    #{} [{}] {} ({}/{} files)",
                job.id, job.status, job.folder_path, job.files_processed, job.files_total
            );
        }
        None => println!("  Active job:    none"),
    }

    match &report.last_run {
        Some(stats) => {
            println!(
                "  Last run:      {} indexed, {} unchanged, {} skipped, {} errors",
                stats.indexed_files,
                stats.skipped_unchanged,
                stats.skipped_limits,
                stats.errors.len()
            );
        }
        None => println!("  Last run:      none recorded"),
    }
}
