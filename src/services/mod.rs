mod chunker;
mod classifier;
mod embedding;
mod extraction;
mod pipeline;
mod retrieval;
mod run_log;
mod splitter;
mod vector_index;

pub use chunker::{CHARS_PER_TOKEN, TextChunker, estimate_tokens};
pub use classifier::{SizeClass, SizeClassifier};
pub use embedding::{Embedder, HealthResponse, HttpEmbedder};
pub use extraction::{ExtractionOrchestrator, SectionExtraction};
pub use pipeline::IngestionPipeline;
pub use retrieval::{RetrievalEngine, cosine_similarity, rank_candidates};
pub use run_log::{RunLog, RunSummary};
pub use splitter::SectionSplitter;
pub use vector_index::{
    CollectionInfo, MemoryIndex, PgVectorIndex, QdrantIndex, SearchOutcome, VectorIndex,
    create_index,
};
