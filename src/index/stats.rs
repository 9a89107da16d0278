//! Indexing run statistics
//!
//! A run produces one `IndexStats` record; incremental runs (resume, the
//! recover pass over chunk-limited files) merge into the prior cumulative
//! record rather than replacing it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a file was skipped, produced directly at each check site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCategory {
    ScannedImage,
    EmptyFile,
    FileTooLarge,
    UnsupportedType,
    ChunkLimitExceeded,
}

impl SkipCategory {
    pub const ALL: [SkipCategory; 5] = [
        SkipCategory::ScannedImage,
        SkipCategory::EmptyFile,
        SkipCategory::FileTooLarge,
        SkipCategory::UnsupportedType,
        SkipCategory::ChunkLimitExceeded,
    ];
}

impl fmt::Display for SkipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipCategory::ScannedImage => "scanned_image",
            SkipCategory::EmptyFile => "empty_file",
            SkipCategory::FileTooLarge => "file_too_large",
            SkipCategory::UnsupportedType => "unsupported_type",
            SkipCategory::ChunkLimitExceeded => "chunk_limit_exceeded",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SkipCategory {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "scanned_image" => Ok(SkipCategory::ScannedImage),
            "empty_file" => Ok(SkipCategory::EmptyFile),
            "file_too_large" => Ok(SkipCategory::FileTooLarge),
            "unsupported_type" => Ok(SkipCategory::UnsupportedType),
            "chunk_limit_exceeded" => Ok(SkipCategory::ChunkLimitExceeded),
            _ => Err(crate::error::Error::Other(format!(
                "Unknown skip category: {}",
                s
            ))),
        }
    }
}

/// A categorized skip with its human-readable reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file_path: String,
    pub file_name: String,
    pub reason: String,
    pub category: SkipCategory,
    /// For chunk-limit skips: how many chunks the file would have produced,
    /// so a recover pass can target exactly these files
    pub chunks_would_be: Option<u32>,
}

/// Per-file timing record for the run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTiming {
    pub file_name: String,
    pub chunks: u32,
    pub total_secs: f64,
    pub embed_secs: f64,
    pub extract_secs: f64,
}

/// Statistics for one indexing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Files in the run's population (not an outcome counter)
    pub total_files: u32,
    pub indexed_files: u32,
    pub skipped_unchanged: u32,
    pub skipped_limits: u32,
    pub removed_missing: u32,
    pub total_chunks: u32,
    pub total_secs: f64,
    pub total_embed_secs: f64,
    pub file_times: Vec<FileTiming>,
    pub errors: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl IndexStats {
    /// Merge an incremental run into this cumulative record: outcome
    /// counters and durations sum, lists concatenate. `total_files` is a
    /// population size, so the larger population wins (a resume or recover
    /// pass re-covers part of the original population).
    pub fn merge(&mut self, other: IndexStats) {
        self.total_files = self.total_files.max(other.total_files);
        self.indexed_files += other.indexed_files;
        self.skipped_unchanged += other.skipped_unchanged;
        self.skipped_limits += other.skipped_limits;
        self.removed_missing += other.removed_missing;
        self.total_chunks += other.total_chunks;
        self.total_secs += other.total_secs;
        self.total_embed_secs += other.total_embed_secs;
        self.file_times.extend(other.file_times);
        self.errors.extend(other.errors);
        self.skipped.extend(other.skipped);
    }

    /// Drop prior skip records for files a recover pass is about to
    /// reprocess, keeping the outcome counters consistent
    pub fn forget_skips(&mut self, file_paths: &[String]) {
        let before = self.skipped.len();
        self.skipped
            .retain(|s| !file_paths.contains(&s.file_path));
        let removed = (before - self.skipped.len()) as u32;
        self.skipped_limits = self.skipped_limits.saturating_sub(removed);
    }

    /// Skips in a category
    pub fn skipped_in(&self, category: SkipCategory) -> Vec<&SkippedFile> {
        self.skipped
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// The slowest successfully indexed files, for the run summary
    pub fn slowest_files(&self, n: usize) -> Vec<&FileTiming> {
        let mut sorted: Vec<&FileTiming> = self.file_times.iter().collect();
        sorted.sort_by(|a, b| {
            b.total_secs
                .partial_cmp(&a.total_secs)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip(path: &str, category: SkipCategory, would_be: Option<u32>) -> SkippedFile {
        SkippedFile {
            file_path: path.to_string(),
            file_name: crate::index::chunker::file_name_of(path),
            reason: category.to_string(),
            category,
            chunks_would_be: would_be,
        }
    }

    #[test]
    fn test_merge_sums_counters_and_concatenates() {
        let mut cumulative = IndexStats {
            total_files: 10,
            indexed_files: 6,
            skipped_limits: 2,
            total_chunks: 40,
            total_secs: 12.0,
            errors: vec!["first error".to_string()],
            skipped: vec![skip("/docs/big.pdf", SkipCategory::ChunkLimitExceeded, Some(90))],
            ..Default::default()
        };

        let incremental = IndexStats {
            total_files: 1,
            indexed_files: 1,
            total_chunks: 12,
            total_secs: 3.0,
            errors: vec!["second error".to_string()],
            ..Default::default()
        };

        cumulative.merge(incremental);
        assert_eq!(cumulative.total_files, 10);
        assert_eq!(cumulative.indexed_files, 7);
        assert_eq!(cumulative.total_chunks, 52);
        assert_eq!(cumulative.errors.len(), 2);
        assert_eq!(cumulative.skipped.len(), 1);
        assert!((cumulative.total_secs - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_forget_skips_clears_category_entry() {
        let mut stats = IndexStats {
            skipped_limits: 2,
            skipped: vec![
                skip("/docs/big.pdf", SkipCategory::ChunkLimitExceeded, Some(90)),
                skip("/docs/scan.pdf", SkipCategory::ScannedImage, None),
            ],
            ..Default::default()
        };

        stats.forget_skips(&["/docs/big.pdf".to_string()]);
        assert_eq!(stats.skipped_limits, 1);
        assert!(stats.skipped_in(SkipCategory::ChunkLimitExceeded).is_empty());
        assert_eq!(stats.skipped_in(SkipCategory::ScannedImage).len(), 1);
    }

    #[test]
    fn test_category_round_trip() {
        for category in SkipCategory::ALL {
            let parsed: SkipCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_slowest_files_ordering() {
        let timing = |name: &str, secs: f64| FileTiming {
            file_name: name.to_string(),
            chunks: 1,
            total_secs: secs,
            embed_secs: 0.0,
            extract_secs: 0.0,
        };
        let stats = IndexStats {
            file_times: vec![timing("fast", 1.0), timing("slow", 9.0), timing("mid", 4.0)],
            ..Default::default()
        };

        let slowest = stats.slowest_files(2);
        assert_eq!(slowest[0].file_name, "slow");
        assert_eq!(slowest[1].file_name, "mid");
    }
}
