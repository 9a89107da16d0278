//! Indexing pipeline
//!
//! This module owns the job lifecycle: scanning, change detection,
//! chunking, embedding, and the concurrent per-file processing loop with
//! pause/resume. Extraction and embedding run fully in parallel; the
//! read-hash/compare, delete-old, and vector+hash+lexical writes are
//! serialized through the single lexical-index mutex so readers never
//! observe a torn update.

pub mod chunker;
pub mod scan;
pub mod stats;

pub use chunker::{chunk_document, chunk_text, compute_file_hash, Chunk};
pub use scan::scan_folder;
pub use stats::{FileTiming, IndexStats, SkipCategory, SkippedFile};

use crate::config::Config;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::extract::ExtractorRegistry;
use crate::jobs::{IndexingJob, JobFileStatus, JobStatus, JobStore};
use crate::search::bm25::LexicalIndex;
use crate::store::VectorStore;
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Progress callback receiving human-readable status lines
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A progress callback that discards everything
pub fn noop_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Cooperative cancellation token, polled between file assignments only;
/// a file already in progress always runs to completion
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for an indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Reindex files even when their content hash is unchanged
    pub force_reindex: bool,
    /// Override the configured per-file chunk ceiling
    pub max_chunks_per_file: Option<u32>,
}

/// Outcome of processing one file
#[derive(Debug, Default)]
struct FileReport {
    file_path: String,
    file_name: String,
    unchanged: bool,
    chunks: u32,
    skipped: Option<SkippedFile>,
    error: Option<String>,
    extract_secs: f64,
    embed_secs: f64,
    total_secs: f64,
}

impl FileReport {
    fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            file_name: chunker::file_name_of(file_path),
            ..Default::default()
        }
    }

    fn skip(&mut self, category: SkipCategory, reason: String, chunks_would_be: Option<u32>) {
        self.skipped = Some(SkippedFile {
            file_path: self.file_path.clone(),
            file_name: self.file_name.clone(),
            reason,
            category,
            chunks_would_be,
        });
    }
}

/// Orchestrates indexing jobs over the vector store, job store, and
/// lexical index
pub struct IndexManager {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    jobs: JobStore,
    /// Shared write mutex: the lexical index guard serializes every
    /// hash-compare/delete/write sequence across all three stores
    lexical: Arc<Mutex<LexicalIndex>>,
    embedder: Arc<dyn Embedder>,
    extractors: Arc<ExtractorRegistry>,
}

impl IndexManager {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn VectorStore>,
        jobs: JobStore,
        lexical: Arc<Mutex<LexicalIndex>>,
        embedder: Arc<dyn Embedder>,
        extractors: Arc<ExtractorRegistry>,
    ) -> Result<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(Error::Config(format!(
                "Embedder dimension {} does not match vector store dimension {}",
                embedder.dimension(),
                store.dimension()
            )));
        }

        Ok(Self {
            config,
            store,
            jobs,
            lexical,
            embedder,
            extractors,
        })
    }

    pub fn job_store(&self) -> &JobStore {
        &self.jobs
    }

    /// Index all supported files under a folder as a new job
    ///
    /// Creating the job discards any other non-terminal job's state; a
    /// cancelled run is parked as paused and can be resumed.
    pub async fn index_folder(
        &self,
        folder: &Path,
        options: &IndexOptions,
        progress: ProgressFn,
        cancel: CancelToken,
    ) -> Result<IndexStats> {
        let files = scan_folder(folder, &self.config.indexing.extensions)?;
        let max_chunks = options
            .max_chunks_per_file
            .unwrap_or(self.config.indexing.max_chunks_per_file);

        let job = self
            .jobs
            .create_job(
                &folder.to_string_lossy(),
                max_chunks,
                options.force_reindex,
                &files,
            )
            .await?;

        let stats = self
            .run_files(&job, files, options.force_reindex, max_chunks, &progress, &cancel)
            .await?;

        self.jobs.save_run_stats(&stats).await?;
        Ok(stats)
    }

    /// Reindex specific files (force), removing vanished files from the
    /// index first
    pub async fn reindex_files(
        &self,
        file_paths: &[String],
        options: &IndexOptions,
        progress: ProgressFn,
        cancel: CancelToken,
    ) -> Result<IndexStats> {
        let emit = |msg: &str| (progress.as_ref())(msg);
        let (existing, missing): (Vec<String>, Vec<String>) = file_paths
            .iter()
            .cloned()
            .partition(|p| Path::new(p).exists());

        if !missing.is_empty() {
            emit(&format!(
                "Warning: {} files no longer exist and will be removed from the index",
                missing.len()
            ));
        }

        for path in &missing {
            let mut lexical = self.lexical.lock().await;
            self.store.delete_by_file(path).await?;
            lexical.remove_file(path)?;
            self.jobs.remove_file(path).await?;
            drop(lexical);
            emit(&format!(
                "Removed missing file from index: {}",
                chunker::file_name_of(path)
            ));
        }

        let mut stats = IndexStats {
            removed_missing: missing.len() as u32,
            ..Default::default()
        };

        if existing.is_empty() {
            self.jobs.save_run_stats(&stats).await?;
            return Ok(stats);
        }

        let max_chunks = options
            .max_chunks_per_file
            .unwrap_or(self.config.indexing.max_chunks_per_file);
        let job = self
            .jobs
            .create_job("(reindex)", max_chunks, true, &existing)
            .await?;

        let run_stats = self
            .run_files(&job, existing, true, max_chunks, &progress, &cancel)
            .await?;
        stats.merge(run_stats);

        self.jobs.save_run_stats(&stats).await?;
        Ok(stats)
    }

    /// Resume a paused job, processing only its pending files
    ///
    /// The incremental run merges into the stored cumulative stats so the
    /// combined record equals a single uninterrupted run.
    pub async fn resume_job(
        &self,
        job_id: i64,
        progress: ProgressFn,
        cancel: CancelToken,
    ) -> Result<IndexStats> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))?;

        match job.get_status()? {
            JobStatus::Paused | JobStatus::Pending => {}
            status => return Err(Error::JobNotResumable(job_id, status.to_string())),
        }

        let pending = self.jobs.pending_files(job_id).await?;
        info!(
            "Resuming job {}: {} of {} files pending",
            job_id,
            pending.len(),
            job.files_total
        );
        (progress.as_ref())(&format!(
            "Resuming job {}: {} files remaining",
            job_id,
            pending.len()
        ));

        let run_stats = self
            .run_files(
                &job,
                pending,
                job.force_reindex,
                job.max_chunks as u32,
                &progress,
                &cancel,
            )
            .await?;

        let mut combined = self.jobs.load_run_stats().await?.unwrap_or_default();
        combined.merge(run_stats);
        self.jobs.save_run_stats(&combined).await?;
        Ok(combined)
    }

    /// Permanently delete a job's state; the only destructive job
    /// transition
    pub async fn discard_job(&self, job_id: i64) -> Result<()> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))?;

        if job.get_status()? == JobStatus::Running {
            return Err(Error::JobActive(job_id));
        }

        self.jobs.discard_job(job_id).await
    }

    /// Reprocess exactly the files skipped for exceeding the chunk
    /// ceiling, with a larger ceiling, merging into the cumulative stats
    pub async fn recover_skipped(
        &self,
        max_chunks: u32,
        progress: ProgressFn,
        cancel: CancelToken,
    ) -> Result<IndexStats> {
        let paths = self
            .jobs
            .skipped_paths(SkipCategory::ChunkLimitExceeded)
            .await?;

        if paths.is_empty() {
            (progress.as_ref())("No chunk-limited files to recover");
            return Ok(self.jobs.load_run_stats().await?.unwrap_or_default());
        }

        (progress.as_ref())(&format!(
            "Recovering {} chunk-limited files with ceiling {}",
            paths.len(),
            max_chunks
        ));

        let mut cumulative = self.jobs.load_run_stats().await?.unwrap_or_default();
        cumulative.forget_skips(&paths);

        let options = IndexOptions {
            force_reindex: true,
            max_chunks_per_file: Some(max_chunks),
        };
        let run_stats = self
            .reindex_files(&paths, &options, progress, cancel)
            .await?;

        cumulative.merge(run_stats);
        self.jobs.save_run_stats(&cumulative).await?;
        Ok(cumulative)
    }

    /// Drive the bounded worker pool over a file list
    async fn run_files(
        &self,
        job: &IndexingJob,
        files: Vec<String>,
        force: bool,
        max_chunks: u32,
        progress: &ProgressFn,
        cancel: &CancelToken,
    ) -> Result<IndexStats> {
        let total = files.len();
        let workers = self.config.indexing.workers.max(1);

        let emit = |msg: &str| (progress.as_ref())(msg);

        self.jobs.set_job_status(job.id, JobStatus::Running).await?;
        emit(&format!(
            "Found {} files to process (workers: {}, max chunks: {})",
            total, workers, max_chunks
        ));

        let mut stats = IndexStats {
            total_files: total as u32,
            ..Default::default()
        };
        let run_start = Instant::now();
        let mut files_processed = job.files_processed as u32;

        let cancel_outer = cancel.clone();
        let mut outcomes = futures::stream::iter(files.into_iter().map(|path| {
            let cancel = cancel_outer.clone();
            async move {
                if cancel.is_cancelled() {
                    return (path, None);
                }
                let report = self.process_file(&path, force, max_chunks).await;
                (path, Some(report))
            }
        }))
        .buffer_unordered(workers);

        let mut completed = 0usize;
        while let Some((path, outcome)) = outcomes.next().await {
            // None: never claimed by a worker, stays pending for resume
            let Some(report) = outcome else { continue };

            completed += 1;
            files_processed += 1;

            let file_status = if report.error.is_some() {
                JobFileStatus::Error
            } else if report.skipped.is_some() {
                JobFileStatus::Skipped
            } else {
                JobFileStatus::Completed
            };
            self.jobs
                .set_job_file_status(job.id, &path, file_status)
                .await?;
            self.jobs
                .update_job_progress(job.id, files_processed)
                .await?;

            if report.unchanged {
                stats.skipped_unchanged += 1;
                emit(&format!(
                    "[{}/{}] Skipped (unchanged): {}",
                    completed, total, report.file_name
                ));
            } else if let Some(error) = &report.error {
                stats
                    .errors
                    .push(format!("Error indexing {}: {}", report.file_path, error));
                emit(&format!(
                    "[{}/{}] ERROR: {} - {}",
                    completed, total, report.file_name, error
                ));
            } else if let Some(skip) = report.skipped {
                stats.skipped_limits += 1;
                emit(&format!(
                    "[{}/{}] Skipped ({}): {}",
                    completed, total, skip.reason, report.file_name
                ));
                stats.skipped.push(skip);
            } else {
                stats.indexed_files += 1;
                stats.total_chunks += report.chunks;
                stats.total_embed_secs += report.embed_secs;
                let rate = if report.embed_secs > 0.0 {
                    report.chunks as f64 / report.embed_secs
                } else {
                    0.0
                };
                emit(&format!(
                    "[{}/{}] Indexed: {} ({} chunks, {:.1}s, {:.1} c/s)",
                    completed, total, report.file_name, report.chunks, report.total_secs, rate
                ));
                stats.file_times.push(FileTiming {
                    file_name: report.file_name,
                    chunks: report.chunks,
                    total_secs: report.total_secs,
                    embed_secs: report.embed_secs,
                    extract_secs: report.extract_secs,
                });
            }
        }

        stats.total_secs = run_start.elapsed().as_secs_f64();

        let remaining = self.jobs.pending_files(job.id).await?;
        if cancel.is_cancelled() && !remaining.is_empty() {
            self.jobs.set_job_status(job.id, JobStatus::Paused).await?;
            info!(
                "Job {} paused: {} of {} files processed",
                job.id, files_processed, job.files_total
            );
            emit(&format!(
                "Indexing paused: {} files remaining (resume with job id {})",
                remaining.len(),
                job.id
            ));
        } else {
            self.jobs
                .set_job_status(job.id, JobStatus::Completed)
                .await?;
        }

        self.emit_summary(&stats, &emit);
        Ok(stats)
    }

    fn emit_summary(&self, stats: &IndexStats, emit: &dyn Fn(&str)) {
        if stats.indexed_files == 0 {
            return;
        }

        emit(&format!("\n{}", "=".repeat(50)));
        emit("TIMING SUMMARY");
        emit(&"=".repeat(50));
        emit(&format!("Total time: {:.1}s", stats.total_secs));
        emit(&format!(
            "Total embed time: {:.1}s",
            stats.total_embed_secs
        ));
        if stats.total_chunks > 0 && stats.total_embed_secs > 0.0 {
            emit(&format!(
                "Avg embed rate: {:.1} chunks/sec",
                stats.total_chunks as f64 / stats.total_embed_secs
            ));
        }
        emit("\nTop 10 slowest files:");
        for timing in stats.slowest_files(10) {
            emit(&format!(
                "  {}: {:.1}s ({} chunks, embed: {:.1}s)",
                timing.file_name, timing.total_secs, timing.chunks, timing.embed_secs
            ));
        }
    }

    /// Process one file; unexpected errors are recorded, never propagated,
    /// so a single bad file cannot abort the batch
    async fn process_file(&self, path: &str, force: bool, max_chunks: u32) -> FileReport {
        let start = Instant::now();
        let mut report = FileReport::new(path);

        if let Err(e) = self.process_file_inner(path, force, max_chunks, &mut report).await {
            warn!("Error indexing {}: {}", path, e);
            report.error = Some(e.to_string());
        }

        report.total_secs = start.elapsed().as_secs_f64();
        report
    }

    async fn process_file_inner(
        &self,
        path: &str,
        force: bool,
        max_chunks: u32,
        report: &mut FileReport,
    ) -> Result<()> {
        let file_path = Path::new(path);
        let current_hash = compute_file_hash(file_path)?;

        let stored_hash = {
            let _write_guard = self.lexical.lock().await;
            self.jobs.get_file_hash(path).await?
        };

        if !force && stored_hash.as_deref() == Some(current_hash.as_str()) {
            report.unchanged = true;
            return Ok(());
        }

        // Previously indexed and changed: clear the old chunk set before
        // reprocessing so readers never see stale duplicates
        if stored_hash.is_some() {
            let mut lexical = self.lexical.lock().await;
            self.store.delete_by_file(path).await?;
            lexical.remove_file(path)?;
        }

        let ext = crate::extract::file_extension(file_path);
        if !self.extractors.supports(&ext) {
            report.skip(
                SkipCategory::UnsupportedType,
                format!("unsupported type: .{}", ext),
                None,
            );
            return Ok(());
        }

        let size_mb = std::fs::metadata(file_path)?.len() as f64 / (1024.0 * 1024.0);
        let limit_mb = self.config.indexing.max_file_size_mb as f64;
        if size_mb > limit_mb {
            report.skip(
                SkipCategory::FileTooLarge,
                format!("file too large: {:.1}MB > {:.0}MB limit", size_mb, limit_mb),
                None,
            );
            return Ok(());
        }

        let extract_start = Instant::now();
        let extracted = self.extractors.extract(file_path)?;
        report.extract_secs = extract_start.elapsed().as_secs_f64();

        if extracted.is_empty() {
            if extracted.image_only {
                report.skip(
                    SkipCategory::ScannedImage,
                    "image-only pages, no extractable text".to_string(),
                    None,
                );
            } else {
                report.skip(
                    SkipCategory::EmptyFile,
                    "no extractable content".to_string(),
                    None,
                );
            }
            return Ok(());
        }

        let chunks = chunk_document(&extracted.units, path, &self.config.chunking);
        if chunks.is_empty() {
            report.skip(
                SkipCategory::EmptyFile,
                "no chunks generated".to_string(),
                None,
            );
            return Ok(());
        }

        if chunks.len() as u32 > max_chunks {
            report.skip(
                SkipCategory::ChunkLimitExceeded,
                format!("too many chunks: {} > {}", chunks.len(), max_chunks),
                Some(chunks.len() as u32),
            );
            return Ok(());
        }

        // The expensive, parallelizable step: no lock held
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embed_start = Instant::now();
        let embeddings = embed_in_batches(
            self.embedder.as_ref(),
            texts.clone(),
            self.config.embedding.batch_size,
        )
        .await?;
        report.embed_secs = embed_start.elapsed().as_secs_f64();

        // Triple write under the shared mutex: vectors, stored hash, and
        // lexical entries must appear atomic to readers
        let ids: Vec<String> = chunks.iter().map(|c| c.id()).collect();
        {
            let mut lexical = self.lexical.lock().await;
            self.store.add(&chunks, &embeddings).await?;
            self.jobs
                .set_file_hash(path, &current_hash, chunks.len() as u32)
                .await?;
            lexical.add(&ids, &texts)?;
        }

        debug!("Indexed {}: {} chunks", path, chunks.len());
        report.chunks = chunks.len() as u32;
        Ok(())
    }
}
