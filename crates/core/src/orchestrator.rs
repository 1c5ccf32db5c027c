use crate::chunking::split_query;
use crate::embeddings::EmbeddingClient;
use crate::error::PipelineError;
use crate::models::{ChunkingOptions, SearchHit, SearchQuery};
use crate::traits::{ChunkStore, EmbeddingProvider};
use crate::vector::vector_norm;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{info, warn};

pub struct SearchPipeline<'a, P, S> {
    embeddings: &'a EmbeddingClient<P>,
    store: &'a S,
    chunking: ChunkingOptions,
}

impl<'a, P, S> SearchPipeline<'a, P, S>
where
    P: EmbeddingProvider + Send + Sync,
    S: ChunkStore,
{
    pub fn new(embeddings: &'a EmbeddingClient<P>, store: &'a S, chunking: ChunkingOptions) -> Self {
        Self {
            embeddings,
            store,
            chunking,
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, PipelineError> {
        let segments = split_query(&query.text, self.chunking);
        if segments.is_empty() {
            return Err(PipelineError::InvalidQuery("query is empty".to_string()));
        }

        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        info!(segments = segments.len(), top_k = query.top_k, "searching documents");
        let vectors = self.embeddings.embed_texts(&segments).await?;

        let mut result_sets = Vec::with_capacity(vectors.len());
        for vector in &vectors {
            let hits = self
                .store
                .similarity_search(vector, vector_norm(vector), query.top_k)?;
            result_sets.push(hits);
        }

        let merged = merge_results(result_sets, query.top_k);
        if merged.is_empty() {
            warn!("no similar chunks found for the query");
        }
        Ok(merged)
    }
}

/// Deduplicates on `(file_identifier, chunk_index)` keeping the highest score,
/// then orders by descending score. Equal scores keep first-seen order.
pub fn merge_results(result_sets: Vec<Vec<SearchHit>>, top_k: usize) -> Vec<SearchHit> {
    let mut merged: Vec<SearchHit> = Vec::new();
    let mut positions: HashMap<(String, u32), usize> = HashMap::new();

    for hit in result_sets.into_iter().flatten() {
        match positions.entry((hit.file_identifier.clone(), hit.chunk_index)) {
            Entry::Occupied(entry) => {
                let existing = &mut merged[*entry.get()];
                if hit.score > existing.score {
                    existing.score = hit.score;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(merged.len());
                merged.push(hit);
            }
        }
    }

    merged.sort_by(|left, right| right.score.total_cmp(&left.score));
    merged.truncate(top_k);
    merged
}
