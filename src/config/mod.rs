//! Configuration management for archivist
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Qdrant connection URL
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Reranker configuration
    #[serde(default)]
    pub reranker: RerankerConfig,

    /// Indexing pipeline configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Query scoping heuristics (entity hints, section keywords)
    #[serde(default)]
    pub hints: HintsConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding backend URL; empty means unconfigured
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Provider name: "none" (identity pass-through) or "http"
    #[serde(default = "default_reranker_provider")]
    pub provider: String,

    /// Reranker backend URL
    #[serde(default = "default_reranker_backend_url")]
    pub backend_url: String,

    /// Reranker model
    #[serde(default = "default_reranker_model")]
    pub model: String,
}

/// Indexing pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// File extensions picked up by the folder scan (an extension listed
    /// here without a registered extractor is recorded as an
    /// unsupported-type skip)
    #[serde(default = "default_index_extensions")]
    pub extensions: Vec<String>,

    /// Number of parallel per-file workers
    #[serde(default = "default_index_workers")]
    pub workers: usize,

    /// Files above this size are skipped without extraction
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Files chunking to more than this are skipped (embedding cost guard)
    #[serde(default = "default_max_chunks_per_file")]
    pub max_chunks_per_file: u32,
}

/// Chunking configuration, tuned per file type because source density differs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Default window size in whitespace tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Default overlap in whitespace tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Window size for PDFs
    #[serde(default = "default_pdf_chunk_size")]
    pub pdf_chunk_size: usize,

    /// Overlap for PDFs
    #[serde(default = "default_pdf_chunk_overlap")]
    pub pdf_chunk_overlap: usize,

    /// Window size for spreadsheets
    #[serde(default = "default_sheet_chunk_size")]
    pub sheet_chunk_size: usize,

    /// Overlap for spreadsheets
    #[serde(default = "default_sheet_chunk_overlap")]
    pub sheet_chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Resolve the (size, overlap) window parameters for a file extension
    pub fn params_for(&self, extension: &str) -> (usize, usize) {
        match extension {
            "pdf" => (self.pdf_chunk_size, self.pdf_chunk_overlap),
            "xlsx" | "xls" | "csv" => (self.sheet_chunk_size, self.sheet_chunk_overlap),
            _ => (self.chunk_size, self.chunk_overlap),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Enable the BM25 lexical leg of hybrid search
    #[serde(default = "default_hybrid_enabled")]
    pub hybrid_enabled: bool,

    /// RRF damping constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Each retrieval leg fetches multiplier x the target count
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Base candidate pool size before reranking (scaled with corpus size)
    #[serde(default = "default_initial_results")]
    pub initial_results: usize,

    /// Results kept after reranking
    #[serde(default = "default_rerank_to")]
    pub rerank_to: usize,

    /// Adjacent-location expansion range (locations within +/- range)
    #[serde(default = "default_expansion_range")]
    pub expansion_range: u32,

    /// Score assigned to expansion-added chunks
    #[serde(default = "default_expansion_score")]
    pub expansion_score: f32,

    /// Limit for the section-keyword substring scan
    #[serde(default = "default_keyword_scan_limit")]
    pub keyword_scan_limit: usize,
}

/// A known entity name mapped to path-substring hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityHint {
    /// Entity name variant as it may appear in a query (lowercase)
    pub name: String,
    /// Normalized path substrings identifying the entity's files
    pub patterns: Vec<String>,
}

/// A query keyword mapped to the document section header it names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionKeyword {
    /// Trigger word looked for in the query (lowercase)
    pub trigger: String,
    /// Exact section header searched for in document text
    pub header: String,
}

/// Two commonly-confused section keywords; a query naming only one drops
/// chunks containing only the other's header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusablePair {
    pub first: String,
    pub second: String,
}

/// Query scoping heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintsConfig {
    /// Entity alias table
    #[serde(default = "HintsConfig::default_entities")]
    pub entities: Vec<EntityHint>,

    /// Keywords marking a query as asking for a protocol document
    #[serde(default = "default_protocol_keywords")]
    pub protocol_keywords: Vec<String>,

    /// Section keyword table
    #[serde(default = "HintsConfig::default_sections")]
    pub sections: Vec<SectionKeyword>,

    /// Mutually-exclusive section trigger pairs
    #[serde(default = "HintsConfig::default_confusable_pairs")]
    pub confusable_pairs: Vec<ConfusablePair>,
}

impl HintsConfig {
    fn default_entities() -> Vec<EntityHint> {
        let entity = |name: &str, patterns: &[&str]| EntityHint {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };
        vec![
            entity("eli lilly", &["elililly", "lilly"]),
            entity("elililly", &["elililly", "lilly"]),
            entity("lilly", &["elililly", "lilly"]),
            entity("ucb", &["ucb"]),
            entity("incyte", &["incyte"]),
        ]
    }

    fn default_sections() -> Vec<SectionKeyword> {
        let section = |trigger: &str, header: &str| SectionKeyword {
            trigger: trigger.to_string(),
            header: header.to_string(),
        };
        vec![
            section("exclusion", "Exclusion Criteria"),
            section("inclusion", "Inclusion Criteria"),
            section("contraindication", "Contraindication"),
            section("adverse", "Adverse Event"),
            section("endpoint", "Endpoint"),
            section("dosing", "Dosing"),
            section("schedule", "Schedule"),
        ]
    }

    fn default_confusable_pairs() -> Vec<ConfusablePair> {
        vec![ConfusablePair {
            first: "inclusion".to_string(),
            second: "exclusion".to_string(),
        }]
    }

    /// Look up the section header for a trigger word
    pub fn section_header(&self, trigger: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.trigger == trigger)
            .map(|s| s.header.as_str())
    }
}

/// Paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub config_file: PathBuf,
    pub db_file: PathBuf,
    pub lexical_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            collection_name: default_collection_name(),
            embedding: EmbeddingConfig::default(),
            reranker: RerankerConfig::default(),
            indexing: IndexingConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            hints: HintsConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            backend_url: default_embedding_backend_url(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: default_reranker_provider(),
            backend_url: default_reranker_backend_url(),
            model: default_reranker_model(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            extensions: default_index_extensions(),
            workers: default_index_workers(),
            max_file_size_mb: default_max_file_size_mb(),
            max_chunks_per_file: default_max_chunks_per_file(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            pdf_chunk_size: default_pdf_chunk_size(),
            pdf_chunk_overlap: default_pdf_chunk_overlap(),
            sheet_chunk_size: default_sheet_chunk_size(),
            sheet_chunk_overlap: default_sheet_chunk_overlap(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            hybrid_enabled: default_hybrid_enabled(),
            rrf_k: default_rrf_k(),
            candidate_multiplier: default_candidate_multiplier(),
            initial_results: default_initial_results(),
            rerank_to: default_rerank_to(),
            expansion_range: default_expansion_range(),
            expansion_score: default_expansion_score(),
            keyword_scan_limit: default_keyword_scan_limit(),
        }
    }
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            entities: Self::default_entities(),
            protocol_keywords: default_protocol_keywords(),
            sections: Self::default_sections(),
            confusable_pairs: Self::default_confusable_pairs(),
        }
    }
}

impl Config {
    /// Get the default base directory for archivist (~/.archivist)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".archivist")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("metadata.db"),
            lexical_file: base.join("lexical_index.json"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("metadata.db"),
            lexical_file: base.join("lexical_index.json"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(
                "chunking.chunk_overlap must be < chunking.chunk_size".to_string(),
            ));
        }

        if self.chunking.pdf_chunk_overlap >= self.chunking.pdf_chunk_size {
            return Err(Error::Config(
                "chunking.pdf_chunk_overlap must be < chunking.pdf_chunk_size".to_string(),
            ));
        }

        if self.chunking.sheet_chunk_overlap >= self.chunking.sheet_chunk_size {
            return Err(Error::Config(
                "chunking.sheet_chunk_overlap must be < chunking.sheet_chunk_size".to_string(),
            ));
        }

        if self.indexing.workers == 0 {
            return Err(Error::Config(
                "indexing.workers must be at least 1".to_string(),
            ));
        }

        if self.search.rrf_k <= 0.0 {
            return Err(Error::Config("search.rrf_k must be positive".to_string()));
        }

        if self.search.candidate_multiplier == 0 {
            return Err(Error::Config(
                "search.candidate_multiplier must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.expansion_score) {
            return Err(Error::Config(
                "search.expansion_score must be between 0.0 and 1.0".to_string(),
            ));
        }

        match self.reranker.provider.as_str() {
            "none" | "http" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown reranker provider '{}'; expected 'none' or 'http'",
                    other
                )));
            }
        }

        Ok(())
    }
}

/// Get the database URL for sqlx
pub fn database_url(config: &Config) -> String {
    format!("sqlite://{}?mode=rwc", config.paths.db_file.display())
}
