use serde::{Deserialize, Serialize};

use super::retrieval::OutputFormat;

pub const DEFAULT_DOCUMENT_API_URL: &str = "http://localhost:18200";
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:16334";
pub const DEFAULT_POSTGRES_URL: &str = "postgres://localhost:5432/docpipe";
pub const DEFAULT_COLLECTION: &str = "docpipe_chunks";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text-v1.5";
pub const DEFAULT_EXTRACTION_MODEL: &str = "document-extractor-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Working margin below the remote API's ~50MB hard upload ceiling.
pub const DEFAULT_SECTION_SIZE_BYTES: u64 = 45 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_index: VectorIndexConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub run_log: RunLogConfig,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("docpipe").join("config.toml"))
    }

    /// Per-project override, checked before the global config.
    pub fn project_config_path() -> std::path::PathBuf {
        std::path::PathBuf::from(".docpipe").join("config.toml")
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        let project = Self::project_config_path();
        if project.exists() {
            return Self::load_from(&project);
        }
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, crate::error::ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Reject configurations that cannot produce a terminating pipeline.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.extraction.section_size_bytes == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "extraction.section_size_bytes must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_overlap_tokens >= self.chunking.chunk_size_tokens {
            return Err(crate::error::ConfigError::ValidationError(format!(
                "chunking.chunk_overlap_tokens ({}) must be less than chunking.chunk_size_tokens ({})",
                self.chunking.chunk_overlap_tokens, self.chunking.chunk_size_tokens
            )));
        }
        if self.embedding.concurrency == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "embedding.concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(crate::error::ConfigError::ValidationError(format!(
                "retrieval.min_similarity must be in [0.0, 1.0], got {}",
                self.retrieval.min_similarity
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_document_api_url")]
    pub api_url: String,

    /// Bearer token; the DOCPIPE_DOCUMENT_API_KEY env var takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_extraction_model")]
    pub model: String,

    #[serde(default = "default_section_size_bytes")]
    pub section_size_bytes: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens_per_section: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "default_min_extracted_chars")]
    pub min_extracted_chars: usize,

    #[serde(default = "default_upload_retries")]
    pub max_upload_retries: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// USD per thousand input tokens, for report cost estimates.
    #[serde(default = "default_input_cost_per_1k")]
    pub input_cost_per_1k_tokens: f64,

    /// USD per thousand output tokens, for report cost estimates.
    #[serde(default = "default_output_cost_per_1k")]
    pub output_cost_per_1k_tokens: f64,
}

fn default_document_api_url() -> String {
    DEFAULT_DOCUMENT_API_URL.to_string()
}

fn default_extraction_model() -> String {
    DEFAULT_EXTRACTION_MODEL.to_string()
}

fn default_section_size_bytes() -> u64 {
    DEFAULT_SECTION_SIZE_BYTES
}

fn default_max_output_tokens() -> u32 {
    65_536
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_poll_timeout_ms() -> u64 {
    120_000
}

fn default_min_extracted_chars() -> usize {
    500
}

fn default_upload_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    300
}

fn default_input_cost_per_1k() -> f64 {
    0.000_15
}

fn default_output_cost_per_1k() -> f64 {
    0.000_6
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_url: default_document_api_url(),
            api_key: None,
            model: default_extraction_model(),
            section_size_bytes: default_section_size_bytes(),
            max_output_tokens_per_section: default_max_output_tokens(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            min_extracted_chars: default_min_extracted_chars(),
            max_upload_retries: default_upload_retries(),
            request_timeout_secs: default_request_timeout(),
            input_cost_per_1k_tokens: default_input_cost_per_1k(),
            output_cost_per_1k_tokens: default_output_cost_per_1k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: u32,

    #[serde(default = "default_chunk_overlap_tokens")]
    pub chunk_overlap_tokens: u32,
}

fn default_chunk_size_tokens() -> u32 {
    500
}

fn default_chunk_overlap_tokens() -> u32 {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size_tokens(),
            chunk_overlap_tokens: default_chunk_overlap_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_embedding_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_embedding_timeout() -> u64 {
    120
}

fn default_embedding_concurrency() -> usize {
    8
}

fn default_embedding_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            concurrency: default_embedding_concurrency(),
            max_retries: default_embedding_retries(),
        }
    }
}

/// Which vector index backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    Postgres,
    Memory,
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(VectorDriver::Qdrant),
            "postgres" | "pgvector" => Ok(VectorDriver::Postgres),
            "memory" => Ok(VectorDriver::Memory),
            _ => Err(format!("unknown vector driver: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::Postgres => write!(f, "postgres"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Connection pool size for the postgres driver.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> u32 {
    5
}

fn default_min_similarity() -> f32 {
    0.7
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            default_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Overall per-document budget; 0 derives one from section count and
    /// poll timeouts.
    #[serde(default)]
    pub document_timeout_ms: u64,
}

fn default_max_file_size() -> u64 {
    500 * 1024 * 1024
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/~$*".to_string(),
        "**/.DS_Store".to_string(),
    ]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            exclude_patterns: default_exclude_patterns(),
            document_timeout_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogConfig {
    #[serde(default = "default_run_log_enabled")]
    pub enabled: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Override for the run log database path; defaults next to the config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<std::path::PathBuf>,
}

fn default_run_log_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    30
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_run_log_enabled(),
            retention_days: default_retention_days(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.extraction.api_url, DEFAULT_DOCUMENT_API_URL);
        assert_eq!(config.extraction.section_size_bytes, 45 * 1024 * 1024);
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.vector_index.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_index.collection, DEFAULT_COLLECTION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_extraction_config_default() {
        let config = ExtractionConfig::default();
        assert_eq!(config.poll_interval_ms, 1_000);
        assert_eq!(config.poll_timeout_ms, 120_000);
        assert_eq!(config.min_extracted_chars, 500);
        assert_eq!(config.max_output_tokens_per_section, 65_536);
    }

    #[test]
    fn test_chunking_config_default() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size_tokens, 500);
        assert_eq!(config.chunk_overlap_tokens, 50);
    }

    #[test]
    fn test_retrieval_config_default() {
        let config = RetrievalConfig::default();
        assert_eq!(config.top_k, 5);
        assert!((config.min_similarity - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_rejects_overlap_not_less_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.chunk_size_tokens = 100;
        config.chunking.chunk_overlap_tokens = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_similarity() {
        let mut config = Config::default();
        config.retrieval.min_similarity = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vector_driver_parse() {
        assert_eq!("qdrant".parse::<VectorDriver>().unwrap(), VectorDriver::Qdrant);
        assert_eq!(
            "pgvector".parse::<VectorDriver>().unwrap(),
            VectorDriver::Postgres
        );
        assert_eq!("memory".parse::<VectorDriver>().unwrap(), VectorDriver::Memory);
        assert!("redis".parse::<VectorDriver>().is_err());
    }
}
