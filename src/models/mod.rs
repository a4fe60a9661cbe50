mod config;
mod document;
mod report;
mod retrieval;
mod session;

pub use config::{
    ChunkingConfig, Config, DEFAULT_COLLECTION, DEFAULT_DOCUMENT_API_URL,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL,
    DEFAULT_EXTRACTION_MODEL, DEFAULT_POSTGRES_URL, DEFAULT_QDRANT_URL,
    DEFAULT_SECTION_SIZE_BYTES, EmbeddingConfig, ExtractionConfig, IngestConfig, RetrievalConfig,
    RunLogConfig, VectorDriver, VectorIndexConfig,
};
pub use document::{Chunk, ExtractedText, Section, SourceDocument};
pub use report::{IngestReport, SectionReport};
pub use retrieval::{OutputFormat, RetrievalQuery, RetrievalResult, RetrievedChunk};
pub use session::{InvalidTransition, SessionState, UploadSession};
