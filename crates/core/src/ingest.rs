use crate::chunking::chunk_text;
use crate::embeddings::EmbeddingClient;
use crate::error::{DatabaseError, ExtractionError, PipelineError};
use crate::extractor::{DocumentExtractor, TextExtractor};
use crate::models::{ChunkRecord, ChunkingOptions, DocumentFormat, IndexStage, IndexedDocument};
use crate::traits::{ChunkStore, EmbeddingProvider};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if DocumentFormat::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderReport {
    pub indexed: Vec<IndexedDocument>,
    pub skipped: Vec<SkippedDocument>,
}

/// Extract → chunk → embed → store for one file at a time. Storage is the
/// only step with side effects and replaces the file's rows atomically, so a
/// failure at any stage leaves the previously indexed version untouched.
pub struct IndexingPipeline<'a, P, S, X = DocumentExtractor> {
    extractor: X,
    embeddings: &'a EmbeddingClient<P>,
    store: &'a S,
    chunking: ChunkingOptions,
}

impl<'a, P, S> IndexingPipeline<'a, P, S, DocumentExtractor> {
    pub fn new(embeddings: &'a EmbeddingClient<P>, store: &'a S, chunking: ChunkingOptions) -> Self {
        Self {
            extractor: DocumentExtractor,
            embeddings,
            store,
            chunking,
        }
    }
}

impl<'a, P, S, X> IndexingPipeline<'a, P, S, X> {
    pub fn with_extractor<Y>(self, extractor: Y) -> IndexingPipeline<'a, P, S, Y> {
        IndexingPipeline {
            extractor,
            embeddings: self.embeddings,
            store: self.store,
            chunking: self.chunking,
        }
    }
}

impl<'a, P, S, X> IndexingPipeline<'a, P, S, X>
where
    P: EmbeddingProvider + Send + Sync,
    S: ChunkStore,
    X: TextExtractor,
{
    pub async fn index_file(&self, path: &Path) -> Result<IndexedDocument, PipelineError> {
        self.index_file_with_progress(path, |_| {}).await
    }

    pub async fn index_file_with_progress<F>(
        &self,
        path: &Path,
        mut on_stage: F,
    ) -> Result<IndexedDocument, PipelineError>
    where
        F: FnMut(IndexStage),
    {
        let file_identifier = path.display().to_string();
        info!(file = %file_identifier, "starting document indexing");

        match self.run_stages(path, &file_identifier, &mut on_stage).await {
            Ok(document) => {
                on_stage(IndexStage::Done);
                info!(
                    file = %file_identifier,
                    chunks = document.chunk_count,
                    dimensions = document.dimensions,
                    "document indexed"
                );
                Ok(document)
            }
            Err(error) => {
                on_stage(IndexStage::Failed);
                warn!(file = %file_identifier, %error, "document indexing failed");
                Err(error)
            }
        }
    }

    async fn run_stages<F>(
        &self,
        path: &Path,
        file_identifier: &str,
        on_stage: &mut F,
    ) -> Result<IndexedDocument, PipelineError>
    where
        F: FnMut(IndexStage),
    {
        on_stage(IndexStage::Extracting);
        let extracted = self.extractor.extract(path)?;

        on_stage(IndexStage::Chunking);
        let chunks = chunk_text(&extracted, self.chunking)?;
        drop(extracted);

        on_stage(IndexStage::Embedding);
        let embeddings = self.embeddings.embed_texts(&chunks).await?;
        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();

        on_stage(IndexStage::Storing);
        let records = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (chunk_text, embedding))| {
                let chunk_index = u32::try_from(index).map_err(|_| {
                    DatabaseError::InvalidArgument(format!("chunk index {index} overflows"))
                })?;
                Ok::<_, DatabaseError>(ChunkRecord {
                    chunk_index,
                    chunk_text,
                    embedding,
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        self.store.replace_file(file_identifier, &records)?;

        Ok(IndexedDocument {
            file_identifier: file_identifier.to_string(),
            chunk_count: records.len(),
            dimensions,
        })
    }

    /// Indexes every `.pdf`/`.docx` under `folder`. A failing file is recorded
    /// in the report and does not stop the remaining files.
    pub async fn index_folder(&self, folder: &Path) -> Result<FolderReport, PipelineError> {
        let files = discover_documents(folder);

        if files.is_empty() {
            return Err(ExtractionError::NoDocuments(folder.display().to_string()).into());
        }

        info!(folder = %folder.display(), files = files.len(), "indexing folder");

        let mut indexed = Vec::new();
        let mut skipped = Vec::new();

        for path in files {
            match self.index_file(&path).await {
                Ok(document) => indexed.push(document),
                Err(error) => skipped.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                }),
            }
        }

        Ok(FolderReport { indexed, skipped })
    }
}
