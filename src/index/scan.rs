//! Folder scanning
//!
//! Recursive walk filtered to supported extensions, skipping Office
//! lock files (`~$...`).

use crate::error::{Error, Result};
use crate::extract::file_extension;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Scan a folder for files with one of the given extensions
///
/// Returns sorted absolute paths so runs over the same tree enumerate
/// files in a stable order.
pub fn scan_folder(folder: &Path, extensions: &[String]) -> Result<Vec<String>> {
    if !folder.is_dir() {
        return Err(Error::InvalidPath(format!(
            "Folder does not exist: {}",
            folder.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(folder).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with("~$") {
            continue;
        }

        let ext = file_extension(entry.path());
        if extensions.iter().any(|e| e == &ext) {
            files.push(entry.path().to_string_lossy().to_string());
        }
    }

    files.sort();
    debug!("Scanned {}: {} candidate files", folder.display(), files.len());
    Ok(files)
}
