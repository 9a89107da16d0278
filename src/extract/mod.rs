//! Text extraction boundary
//!
//! File-format parsing is a collaborator, not a concern of this crate:
//! extractors implement [`Extractor`] and register by extension. The
//! registry is what the indexing pipeline talks to.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One extraction unit: a page, slide, sheet, or section with its text
#[derive(Debug, Clone)]
pub struct ExtractedUnit {
    /// Page/slide/sheet number, 1-based
    pub location: u32,
    pub text: String,
}

/// Result of extracting a whole file
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    /// Units in document order; empty means no extractable content
    pub units: Vec<ExtractedUnit>,
    /// True when the file has pages but they are image-only (scanned document)
    pub image_only: bool,
}

impl ExtractedDocument {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() || self.units.iter().all(|u| u.text.trim().is_empty())
    }
}

/// Trait for file-format extractors
pub trait Extractor: Send + Sync {
    /// Extract text units from a file
    fn extract(&self, path: &Path) -> Result<ExtractedDocument>;

    /// Extensions (lowercase, without dot) this extractor handles
    fn extensions(&self) -> &[&'static str];
}

/// Extension-dispatched extractor registry
#[derive(Default, Clone)]
pub struct ExtractorRegistry {
    by_ext: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in plain-text extractor registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextExtractor));
        registry
    }

    /// Register an extractor for all extensions it declares
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for ext in extractor.extensions() {
            self.by_ext.insert(ext.to_string(), extractor.clone());
        }
    }

    /// Whether any extractor handles this extension
    pub fn supports(&self, extension: &str) -> bool {
        self.by_ext.contains_key(&extension.to_lowercase())
    }

    /// Extract a file via the extractor registered for its extension
    pub fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let ext = file_extension(path);
        let extractor = self
            .by_ext
            .get(&ext)
            .ok_or_else(|| Error::UnsupportedFileType(format!(".{}", ext)))?;
        extractor.extract(path)
    }
}

/// Lowercase extension of a path, without the dot
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Singular location-unit name for an extension ("page 3", "slide 7")
pub fn location_unit(extension: &str) -> &'static str {
    match extension {
        "pdf" => "page",
        "pptx" | "ppt" => "slide",
        "xlsx" | "xls" | "csv" => "sheet",
        _ => "section",
    }
}

/// Built-in extractor for plain-text files
///
/// Form feeds split a file into numbered sections so page-oriented fixtures
/// can be expressed as plain text.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        let content = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&content);

        let units = text
            .split('\x0c')
            .enumerate()
            .filter(|(_, section)| !section.trim().is_empty())
            .map(|(i, section)| ExtractedUnit {
                location: (i + 1) as u32,
                text: section.trim().to_string(),
            })
            .collect();

        Ok(ExtractedDocument {
            units,
            image_only: false,
        })
    }

    fn extensions(&self) -> &[&'static str] {
        &["txt", "md"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_plain_text_single_section() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        write!(file, "hello world").unwrap();

        let doc = PlainTextExtractor.extract(file.path()).unwrap();
        assert_eq!(doc.units.len(), 1);
        assert_eq!(doc.units[0].location, 1);
        assert_eq!(doc.units[0].text, "hello world");
        assert!(!doc.image_only);
    }

    #[test]
    fn test_plain_text_form_feed_sections() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        write!(file, "first page\x0csecond page\x0cthird page").unwrap();

        let doc = PlainTextExtractor.extract(file.path()).unwrap();
        assert_eq!(doc.units.len(), 3);
        assert_eq!(doc.units[2].location, 3);
        assert_eq!(doc.units[1].text, "second page");
    }

    #[test]
    fn test_empty_file_yields_no_units() {
        let file = NamedTempFile::with_suffix(".txt").unwrap();
        let doc = PlainTextExtractor.extract(file.path()).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.supports("txt"));
        assert!(registry.supports("md"));
        assert!(!registry.supports("pptx"));

        let err = registry
            .extract(Path::new("/tmp/deck.pptx"))
            .expect_err("unregistered extension should be rejected");
        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }

    #[test]
    fn test_location_units() {
        assert_eq!(location_unit("pdf"), "page");
        assert_eq!(location_unit("pptx"), "slide");
        assert_eq!(location_unit("xlsx"), "sheet");
        assert_eq!(location_unit("docx"), "section");
    }
}
