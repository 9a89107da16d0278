//! Token-window chunking and content hashing
//!
//! Documents are split per extraction unit into overlapping windows of
//! whitespace tokens. Window parameters are tuned per file type because
//! source density differs (PDF pages carry far more text than spreadsheet
//! rows). Every chunk is prefixed with a short provenance header so it
//! stays attributable when read out of context.

use crate::config::ChunkingConfig;
use crate::extract::{location_unit, ExtractedUnit};
use blake3::Hasher;
use std::io::Read;
use std::path::Path;

/// A bounded, overlapping window of document text; the unit of embedding
/// and retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk text, prefixed with the provenance header
    pub text: String,
    pub file_path: String,
    /// Page/slide/sheet number the window came from
    pub location_number: u32,
    /// Monotonic from 0 within each extraction unit
    pub chunk_index: u32,
}

impl Chunk {
    /// Stable string identity: `{file_path}::loc{location}::chunk{index}`
    pub fn id(&self) -> String {
        chunk_id(&self.file_path, self.location_number, self.chunk_index)
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.file_path)
    }
}

/// Build the canonical chunk id string
pub fn chunk_id(file_path: &str, location: u32, index: u32) -> String {
    format!("{}::loc{}::chunk{}", file_path, location, index)
}

/// Parse a chunk id back into (file_path, location, chunk_index)
///
/// Parsed from the right so file paths containing "::" stay intact.
pub fn parse_chunk_id(id: &str) -> Option<(String, u32, u32)> {
    let chunk_sep = id.rfind("::chunk")?;
    let loc_sep = id[..chunk_sep].rfind("::loc")?;

    let index: u32 = id[chunk_sep + "::chunk".len()..].parse().ok()?;
    let location: u32 = id[loc_sep + "::loc".len()..chunk_sep].parse().ok()?;
    Some((id[..loc_sep].to_string(), location, index))
}

/// File name component of a path string
pub fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Split one extraction unit into overlapping token windows
///
/// Window `[start, start + size)`, next `start = end - overlap` while the
/// end has not reached the final token; the last window may be shorter.
/// Empty or whitespace-only text yields no chunks.
pub fn chunk_text(
    text: &str,
    file_path: &str,
    location: u32,
    size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let header = chunk_header(file_path, location);
    let words: Vec<&str> = text.split_whitespace().collect();
    let total = words.len();

    if total <= size {
        return vec![Chunk {
            text: format!("{}{}", header, words.join(" ")),
            file_path: file_path.to_string(),
            location_number: location,
            chunk_index: 0,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chunk_index = 0;

    loop {
        let end = (start + size).min(total);
        chunks.push(Chunk {
            text: format!("{}{}", header, words[start..end].join(" ")),
            file_path: file_path.to_string(),
            location_number: location,
            chunk_index,
        });

        if end >= total {
            break;
        }

        start = end - overlap;
        chunk_index += 1;
    }

    chunks
}

/// Chunk an entire extracted document (all units)
pub fn chunk_document(
    units: &[ExtractedUnit],
    file_path: &str,
    config: &ChunkingConfig,
) -> Vec<Chunk> {
    let ext = crate::extract::file_extension(Path::new(file_path));
    let (size, overlap) = config.params_for(&ext);

    let mut all_chunks = Vec::new();
    for unit in units {
        all_chunks.extend(chunk_text(
            &unit.text,
            file_path,
            unit.location,
            size,
            overlap,
        ));
    }
    all_chunks
}

/// Provenance header prefixed to each chunk's text
fn chunk_header(file_path: &str, location: u32) -> String {
    let ext = crate::extract::file_extension(Path::new(file_path));
    format!(
        "[{} {} {}] ",
        file_name_of(file_path),
        location_unit(&ext),
        location
    )
}

/// Compute a file's content hash with a streaming digest
pub fn compute_file_hash(path: &Path) -> crate::error::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Hasher::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
