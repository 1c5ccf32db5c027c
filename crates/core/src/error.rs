use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported file format: {0} (only .pdf and .docx are supported)")]
    UnsupportedFormat(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx parse error: {0}")]
    DocxParse(String),

    #[error("no extractable text in {0}")]
    NoText(String),

    #[error("no .pdf or .docx files found in {0}")]
    NoDocuments(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("embedding provider rate limit exhausted: {0}")]
    RateLimited(String),

    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("nothing to embed")]
    EmptyInput,
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("embedding dimension {found} does not match stored dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("stored embedding is corrupt: {0}")]
    CorruptEmbedding(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid configuration value for {key}: {details}")]
    Invalid { key: &'static str, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
