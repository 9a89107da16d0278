//! SQLite schema definition

/// SQL schema for the job database
pub const SCHEMA_SQL: &str = r#"
-- Indexed files: one row per absolute path with its content hash
CREATE TABLE IF NOT EXISTS indexed_files (
    file_path TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    indexed_at TEXT NOT NULL
);

-- Indexing jobs: one pausable/resumable run over a folder or file set
CREATE TABLE IF NOT EXISTS indexing_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_path TEXT NOT NULL,
    max_chunks INTEGER NOT NULL DEFAULT 50,
    force_reindex INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    files_total INTEGER NOT NULL DEFAULT 0,
    files_processed INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);

-- Per-file job state, queried to resume
CREATE TABLE IF NOT EXISTS indexing_job_files (
    job_id INTEGER NOT NULL REFERENCES indexing_jobs(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    PRIMARY KEY (job_id, file_path)
);

-- Latest cumulative run statistics (single row, replaced per run)
CREATE TABLE IF NOT EXISTS indexing_results (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    total_files INTEGER NOT NULL,
    indexed_files INTEGER NOT NULL,
    skipped_unchanged INTEGER NOT NULL,
    skipped_limits INTEGER NOT NULL,
    removed_missing INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    total_secs REAL NOT NULL,
    total_embed_secs REAL NOT NULL,
    errors_json TEXT,
    created_at TEXT NOT NULL
);

-- Categorized skips from the latest run, replaced alongside the results
CREATE TABLE IF NOT EXISTS skipped_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    reason TEXT NOT NULL,
    category TEXT NOT NULL,
    chunks_would_be INTEGER
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_job_files_status ON indexing_job_files(job_id, status);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON indexing_jobs(status);
CREATE INDEX IF NOT EXISTS idx_skipped_category ON skipped_files(category);
"#;
