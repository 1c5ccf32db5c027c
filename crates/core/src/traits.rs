use crate::error::{DatabaseError, EmbeddingError};
use crate::models::{ChunkRecord, FileSummary, SearchHit};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingProvider {
    /// Largest number of texts a single `embed_batch` call accepts.
    fn max_batch_size(&self) -> usize;

    /// Embeds one batch in a single round-trip. Output order matches input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

pub trait ChunkStore {
    fn bootstrap_schema(&self) -> Result<(), DatabaseError>;

    /// Replaces every chunk of `file_identifier` with `chunks` in one transaction.
    fn replace_file(&self, file_identifier: &str, chunks: &[ChunkRecord])
        -> Result<(), DatabaseError>;

    /// Returns the number of rows removed; zero for a file that was never indexed.
    fn delete_file(&self, file_identifier: &str) -> Result<usize, DatabaseError>;

    fn clear_all(&self) -> Result<usize, DatabaseError>;

    fn list_files(&self) -> Result<Vec<FileSummary>, DatabaseError>;

    fn similarity_search(
        &self,
        query_embedding: &[f32],
        query_norm: f64,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, DatabaseError>;
}
