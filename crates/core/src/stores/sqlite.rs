use crate::error::DatabaseError;
use crate::models::{ChunkRecord, FileSummary, SearchHit};
use crate::traits::ChunkStore;
use crate::vector::{decode_embedding, dot_product, encode_embedding, vector_norm};
use chrono::Utc;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

/// Bumping this forces every cached `embedding_norm` to be recomputed on open.
const SCHEMA_VERSION: i64 = 1;

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS document_chunks (
    file_identifier TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    split_strategy TEXT NOT NULL DEFAULT 'paragraph',
    embedding BLOB NOT NULL,
    embedding_dim INTEGER NOT NULL,
    embedding_norm REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (file_identifier, chunk_index)
);
";

const INSERT_CHUNK: &str = "
INSERT INTO document_chunks
    (file_identifier, chunk_index, chunk_text, split_strategy, embedding, embedding_dim, embedding_norm, created_at)
VALUES (?1, ?2, ?3, 'paragraph', ?4, ?5, vector_norm(?4), ?6)
";

const SIMILARITY_QUERY: &str = "
SELECT file_identifier, chunk_index, chunk_text,
       dot_product(embedding, ?1) / (embedding_norm * ?2) AS similarity
FROM document_chunks
WHERE embedding_norm > 0
ORDER BY similarity DESC, rowid ASC
LIMIT ?3
";

/// Chunk storage on a single SQLite connection. Cosine scoring runs inside
/// the engine through the `dot_product` and `vector_norm` scalar functions.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let connection = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened document database");
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, DatabaseError> {
        let store = Self { connection };
        store.bootstrap_schema()?;
        Ok(store)
    }

    /// Dimension shared by every stored embedding, or `None` for an empty table.
    pub fn stored_dimensions(&self) -> Result<Option<usize>, DatabaseError> {
        let dimension: Option<i64> = self
            .connection
            .query_row(
                "SELECT embedding_dim FROM document_chunks LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dimension.map(|value| value as usize))
    }

    pub fn refresh_norms(&self) -> Result<usize, DatabaseError> {
        let updated = self.connection.execute(
            "UPDATE document_chunks SET embedding_norm = vector_norm(embedding)",
            [],
        )?;
        debug!(rows = updated, "recomputed embedding norms");
        Ok(updated)
    }

    /// Stored chunks of one file in `chunk_index` order.
    pub fn file_chunks(&self, file_identifier: &str) -> Result<Vec<ChunkRecord>, DatabaseError> {
        let mut statement = self.connection.prepare(
            "SELECT chunk_index, chunk_text, embedding FROM document_chunks
             WHERE file_identifier = ?1 ORDER BY chunk_index",
        )?;

        let rows = statement
            .query_map([file_identifier], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(chunk_index, chunk_text, blob)| {
                Ok::<_, DatabaseError>(ChunkRecord {
                    chunk_index,
                    chunk_text,
                    embedding: decode_embedding(&blob)?,
                })
            })
            .collect()
    }

    fn register_functions(&self) -> Result<(), DatabaseError> {
        let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

        self.connection
            .create_scalar_function("dot_product", 2, flags, |ctx| {
                let a = embedding_arg(ctx, 0)?;
                let b = embedding_arg(ctx, 1)?;
                dot_product(&a, &b).ok_or_else(|| {
                    rusqlite::Error::UserFunctionError(
                        format!("dot_product: length {} != {}", a.len(), b.len()).into(),
                    )
                })
            })?;

        self.connection
            .create_scalar_function("vector_norm", 1, flags, |ctx| {
                let vector = embedding_arg(ctx, 0)?;
                Ok(vector_norm(&vector))
            })?;

        Ok(())
    }
}

fn embedding_arg(ctx: &Context<'_>, index: usize) -> rusqlite::Result<Vec<f32>> {
    let blob: Vec<u8> = ctx.get(index)?;
    decode_embedding(&blob)
        .map_err(|error| rusqlite::Error::UserFunctionError(error.to_string().into()))
}

fn validate_chunks(file_identifier: &str, chunks: &[ChunkRecord]) -> Result<usize, DatabaseError> {
    if file_identifier.trim().is_empty() {
        return Err(DatabaseError::InvalidArgument(
            "file identifier cannot be empty".to_string(),
        ));
    }

    let first = chunks.first().ok_or_else(|| {
        DatabaseError::InvalidArgument(format!("no chunks supplied for {file_identifier}"))
    })?;

    let dimension = first.embedding.len();
    if dimension == 0 {
        return Err(DatabaseError::InvalidArgument(
            "embeddings cannot be empty".to_string(),
        ));
    }

    if let Some(chunk) = chunks.iter().find(|chunk| chunk.embedding.len() != dimension) {
        return Err(DatabaseError::DimensionMismatch {
            expected: dimension,
            found: chunk.embedding.len(),
        });
    }

    Ok(dimension)
}

impl ChunkStore for SqliteStore {
    fn bootstrap_schema(&self) -> Result<(), DatabaseError> {
        self.register_functions()?;

        let tx = self.connection.unchecked_transaction()?;
        tx.execute_batch(CREATE_TABLE)?;

        let version: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            let refreshed = tx.execute(
                "UPDATE document_chunks SET embedding_norm = vector_norm(embedding)",
                [],
            )?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!(from = version, to = SCHEMA_VERSION, refreshed, "upgraded chunk schema");
        }

        tx.commit()?;
        debug!("database schema verified");
        Ok(())
    }

    fn replace_file(
        &self,
        file_identifier: &str,
        chunks: &[ChunkRecord],
    ) -> Result<(), DatabaseError> {
        let dimension = validate_chunks(file_identifier, chunks)?;

        let tx = self.connection.unchecked_transaction()?;

        let stored: Option<i64> = tx
            .query_row(
                "SELECT embedding_dim FROM document_chunks WHERE file_identifier <> ?1 LIMIT 1",
                params![file_identifier],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(stored) = stored {
            if stored as usize != dimension {
                return Err(DatabaseError::DimensionMismatch {
                    expected: stored as usize,
                    found: dimension,
                });
            }
        }

        let removed = tx.execute(
            "DELETE FROM document_chunks WHERE file_identifier = ?1",
            params![file_identifier],
        )?;

        let created_at = Utc::now().to_rfc3339();
        {
            let mut insert = tx.prepare(INSERT_CHUNK)?;
            for chunk in chunks {
                insert.execute(params![
                    file_identifier,
                    chunk.chunk_index,
                    chunk.chunk_text,
                    encode_embedding(&chunk.embedding),
                    dimension as i64,
                    created_at,
                ])?;
            }
        }

        tx.commit()?;
        info!(
            file = file_identifier,
            removed,
            inserted = chunks.len(),
            "replaced file chunks"
        );
        Ok(())
    }

    fn delete_file(&self, file_identifier: &str) -> Result<usize, DatabaseError> {
        let removed = self.connection.execute(
            "DELETE FROM document_chunks WHERE file_identifier = ?1",
            params![file_identifier],
        )?;
        info!(file = file_identifier, removed, "deleted file chunks");
        Ok(removed)
    }

    fn clear_all(&self) -> Result<usize, DatabaseError> {
        let removed = self.connection.execute("DELETE FROM document_chunks", [])?;
        warn!(removed, "cleared all document chunks");
        Ok(removed)
    }

    fn list_files(&self) -> Result<Vec<FileSummary>, DatabaseError> {
        let mut statement = self.connection.prepare(
            "SELECT file_identifier, COUNT(*) FROM document_chunks
             GROUP BY file_identifier ORDER BY file_identifier",
        )?;

        let files = statement
            .query_map([], |row| {
                Ok(FileSummary {
                    file_identifier: row.get(0)?,
                    chunk_count: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(files = files.len(), "listed indexed files");
        Ok(files)
    }

    fn similarity_search(
        &self,
        query_embedding: &[f32],
        query_norm: f64,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, DatabaseError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        if query_embedding.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "query embedding cannot be empty".to_string(),
            ));
        }

        if !query_norm.is_finite() || query_norm <= 0.0 {
            warn!(query_norm, "query vector norm is zero, cannot compute similarity");
            return Ok(Vec::new());
        }

        if let Some(stored) = self.stored_dimensions()? {
            if stored != query_embedding.len() {
                return Err(DatabaseError::DimensionMismatch {
                    expected: stored,
                    found: query_embedding.len(),
                });
            }
        }

        let limit = i64::try_from(top_k).unwrap_or(i64::MAX);
        let mut statement = self.connection.prepare(SIMILARITY_QUERY)?;
        let hits = statement
            .query_map(
                params![encode_embedding(query_embedding), query_norm, limit],
                |row| {
                    Ok(SearchHit {
                        file_identifier: row.get(0)?,
                        chunk_index: row.get(1)?,
                        chunk_text: row.get(2)?,
                        score: row.get(3)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(hits = hits.len(), top_k, "similarity search finished");
        Ok(hits)
    }
}
