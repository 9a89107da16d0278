//! Durable job storage using SQLite
//!
//! This module persists everything the indexing pipeline needs to survive
//! a restart:
//! - Indexed files and their content hashes
//! - Indexing jobs and per-file job state (pause/resume)
//! - Cumulative run statistics and categorized skips

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use crate::index::stats::{IndexStats, SkipCategory, SkippedFile};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Indexing job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Non-terminal states; at most one job in these states may exist
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running | JobStatus::Paused)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Paused => write!(f, "paused"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(Error::Other(format!("Unknown job status: {}", s))),
        }
    }
}

/// Per-file status within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobFileStatus {
    Pending,
    Completed,
    Skipped,
    Error,
}

impl std::fmt::Display for JobFileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobFileStatus::Pending => write!(f, "pending"),
            JobFileStatus::Completed => write!(f, "completed"),
            JobFileStatus::Skipped => write!(f, "skipped"),
            JobFileStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for JobFileStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobFileStatus::Pending),
            "completed" => Ok(JobFileStatus::Completed),
            "skipped" => Ok(JobFileStatus::Skipped),
            "error" => Ok(JobFileStatus::Error),
            _ => Err(Error::Other(format!("Unknown job file status: {}", s))),
        }
    }
}

/// An indexed file row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexedFile {
    pub file_path: String,
    pub content_hash: String,
    pub chunk_count: i64,
    pub indexed_at: String,
}

/// An indexing job row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexingJob {
    pub id: i64,
    pub folder_path: String,
    pub max_chunks: i64,
    pub force_reindex: bool,
    pub status: String,
    pub files_total: i64,
    pub files_processed: i64,
    pub started_at: Option<String>,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl IndexingJob {
    pub fn get_status(&self) -> Result<JobStatus> {
        self.status.parse()
    }
}

/// Job database handle
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    /// Open the job database, creating it if missing
    ///
    /// A corrupted database is detected at open, reset, and recreated once.
    pub async fn open(db_path: &Path) -> Result<Self> {
        match Self::try_open(db_path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!(
                    "Job database at {} failed to open ({}); resetting and recreating",
                    db_path.display(),
                    e
                );
                Self::reset_files(db_path);
                Self::try_open(db_path).await
            }
        }
    }

    async fn try_open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to job database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    fn reset_files(db_path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = db_path.as_os_str().to_owned();
            path.push(suffix);
            let _ = std::fs::remove_file(Path::new(&path));
        }
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    // ===== Indexed file operations =====

    /// Get the stored content hash for a file path
    pub async fn get_file_hash(&self, file_path: &str) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM indexed_files WHERE file_path = ?")
                .bind(file_path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }

    /// Store or update a file's hash and chunk count
    pub async fn set_file_hash(
        &self,
        file_path: &str,
        content_hash: &str,
        chunk_count: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indexed_files (file_path, content_hash, chunk_count, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(file_path) DO UPDATE SET
                content_hash = excluded.content_hash,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(file_path)
        .bind(content_hash)
        .bind(chunk_count as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a file's row
    pub async fn remove_file(&self, file_path: &str) -> Result<()> {
        sqlx::query("DELETE FROM indexed_files WHERE file_path = ?")
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List all indexed files
    pub async fn list_files(&self) -> Result<Vec<IndexedFile>> {
        let files =
            sqlx::query_as::<_, IndexedFile>("SELECT * FROM indexed_files ORDER BY file_path")
                .fetch_all(&self.pool)
                .await?;
        Ok(files)
    }

    /// Total chunk count across indexed files
    pub async fn total_chunk_count(&self) -> Result<u32> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT SUM(chunk_count) FROM indexed_files")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.unwrap_or(0) as u32)
    }

    // ===== Job operations =====

    /// Create a new indexing job, discarding any other non-terminal job
    /// and its per-file rows (single active job invariant)
    pub async fn create_job(
        &self,
        folder_path: &str,
        max_chunks: u32,
        force_reindex: bool,
        files: &[String],
    ) -> Result<IndexingJob> {
        sqlx::query(
            "DELETE FROM indexing_jobs WHERE status IN ('pending', 'running', 'paused')",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "DELETE FROM indexing_job_files WHERE job_id NOT IN (SELECT id FROM indexing_jobs)",
        )
        .execute(&self.pool)
        .await?;

        let now = Utc::now().to_rfc3339();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO indexing_jobs
                (folder_path, max_chunks, force_reindex, status, files_total, started_at, updated_at)
            VALUES (?, ?, ?, 'pending', ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(folder_path)
        .bind(max_chunks as i64)
        .bind(force_reindex)
        .bind(files.len() as i64)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        for file_path in files {
            sqlx::query(
                "INSERT OR IGNORE INTO indexing_job_files (job_id, file_path, status) VALUES (?, ?, 'pending')",
            )
            .bind(id)
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        }

        info!("Created indexing job {} ({} files)", id, files.len());
        self.get_job(id).await?.ok_or(Error::JobNotFound(id))
    }

    /// Get a job by id
    pub async fn get_job(&self, id: i64) -> Result<Option<IndexingJob>> {
        let job = sqlx::query_as::<_, IndexingJob>("SELECT * FROM indexing_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Get the current non-terminal job, if any
    pub async fn active_job(&self) -> Result<Option<IndexingJob>> {
        let job = sqlx::query_as::<_, IndexingJob>(
            r#"
            SELECT * FROM indexing_jobs
            WHERE status IN ('pending', 'running', 'paused')
            ORDER BY id DESC LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// Update a job's status, stamping completed_at for terminal states
    pub async fn set_job_status(&self, id: i64, status: JobStatus) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        if matches!(status, JobStatus::Completed | JobStatus::Cancelled) {
            sqlx::query(
                "UPDATE indexing_jobs SET status = ?, completed_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(status.to_string())
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE indexing_jobs SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Persist a job's processed-file count
    pub async fn update_job_progress(&self, id: i64, files_processed: u32) -> Result<()> {
        sqlx::query("UPDATE indexing_jobs SET files_processed = ?, updated_at = ? WHERE id = ?")
            .bind(files_processed as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Update the status of one file within a job
    pub async fn set_job_file_status(
        &self,
        job_id: i64,
        file_path: &str,
        status: JobFileStatus,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE indexing_job_files SET status = ? WHERE job_id = ? AND file_path = ?",
        )
        .bind(status.to_string())
        .bind(job_id)
        .bind(file_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Files not yet processed for a job, in stable order
    pub async fn pending_files(&self, job_id: i64) -> Result<Vec<String>> {
        let files: Vec<String> = sqlx::query_scalar(
            "SELECT file_path FROM indexing_job_files WHERE job_id = ? AND status = 'pending' ORDER BY file_path",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    /// Permanently delete a job and its file rows
    pub async fn discard_job(&self, job_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM indexing_job_files WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM indexing_jobs WHERE id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        info!("Discarded indexing job {}", job_id);
        Ok(())
    }

    // ===== Run statistics =====

    /// Save run statistics, replacing the previous run's record and skips
    pub async fn save_run_stats(&self, stats: &IndexStats) -> Result<()> {
        sqlx::query("DELETE FROM indexing_results")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM skipped_files")
            .execute(&self.pool)
            .await?;

        let errors_json = if stats.errors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&stats.errors)?)
        };

        sqlx::query(
            r#"
            INSERT INTO indexing_results (
                id, total_files, indexed_files, skipped_unchanged, skipped_limits,
                removed_missing, total_chunks, total_secs, total_embed_secs,
                errors_json, created_at
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stats.total_files as i64)
        .bind(stats.indexed_files as i64)
        .bind(stats.skipped_unchanged as i64)
        .bind(stats.skipped_limits as i64)
        .bind(stats.removed_missing as i64)
        .bind(stats.total_chunks as i64)
        .bind(stats.total_secs)
        .bind(stats.total_embed_secs)
        .bind(errors_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        for skip in &stats.skipped {
            sqlx::query(
                r#"
                INSERT INTO skipped_files (file_path, file_name, reason, category, chunks_would_be)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&skip.file_path)
            .bind(&skip.file_name)
            .bind(&skip.reason)
            .bind(skip.category.to_string())
            .bind(skip.chunks_would_be.map(|c| c as i64))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Load the most recent run statistics
    pub async fn load_run_stats(&self) -> Result<Option<IndexStats>> {
        #[derive(FromRow)]
        struct ResultsRow {
            total_files: i64,
            indexed_files: i64,
            skipped_unchanged: i64,
            skipped_limits: i64,
            removed_missing: i64,
            total_chunks: i64,
            total_secs: f64,
            total_embed_secs: f64,
            errors_json: Option<String>,
        }

        let row = sqlx::query_as::<_, ResultsRow>(
            r#"
            SELECT total_files, indexed_files, skipped_unchanged, skipped_limits,
                   removed_missing, total_chunks, total_secs, total_embed_secs, errors_json
            FROM indexing_results WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        #[derive(FromRow)]
        struct SkipRow {
            file_path: String,
            file_name: String,
            reason: String,
            category: String,
            chunks_would_be: Option<i64>,
        }

        let skip_rows = sqlx::query_as::<_, SkipRow>(
            "SELECT file_path, file_name, reason, category, chunks_would_be FROM skipped_files",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut skipped = Vec::with_capacity(skip_rows.len());
        for row in skip_rows {
            skipped.push(SkippedFile {
                file_path: row.file_path,
                file_name: row.file_name,
                reason: row.reason,
                category: row.category.parse()?,
                chunks_would_be: row.chunks_would_be.map(|c| c as u32),
            });
        }

        let errors: Vec<String> = match row.errors_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        Ok(Some(IndexStats {
            total_files: row.total_files as u32,
            indexed_files: row.indexed_files as u32,
            skipped_unchanged: row.skipped_unchanged as u32,
            skipped_limits: row.skipped_limits as u32,
            removed_missing: row.removed_missing as u32,
            total_chunks: row.total_chunks as u32,
            total_secs: row.total_secs,
            total_embed_secs: row.total_embed_secs,
            file_times: Vec::new(),
            errors,
            skipped,
        }))
    }

    /// File paths skipped in a category during the last run
    pub async fn skipped_paths(&self, category: SkipCategory) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar(
            "SELECT file_path FROM skipped_files WHERE category = ? ORDER BY file_path",
        )
        .bind(category.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(paths)
    }
}
