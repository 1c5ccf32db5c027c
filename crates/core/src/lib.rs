pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod stores;
pub mod traits;
pub mod vector;

#[cfg(test)]
pub(crate) mod testing;

pub use chunking::{chunk_text, normalize_pdf_text, normalize_whitespace, split_query};
pub use config::{EmbeddingSettings, ProviderKind, Settings};
pub use embeddings::{EmbeddingClient, DEFAULT_BATCH_SIZE};
pub use error::{ConfigError, DatabaseError, EmbeddingError, ExtractionError, PipelineError};
pub use extractor::{extract_text, DocumentExtractor, TextExtractor};
pub use ingest::{discover_documents, FolderReport, IndexingPipeline, SkippedDocument};
pub use models::{
    ChunkRecord, ChunkingOptions, DocumentFormat, ExtractedText, FileSummary, IndexStage,
    IndexedDocument, SearchHit, SearchQuery,
};
pub use orchestrator::{merge_results, SearchPipeline};
pub use providers::{embedding_client, ConfiguredEmbedder, GeminiEmbedder, HashingEmbedder};
pub use stores::SqliteStore;
pub use traits::{ChunkStore, EmbeddingProvider};
pub use vector::{cosine_similarity, vector_norm};
