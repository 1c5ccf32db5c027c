use crate::embeddings::DEFAULT_BATCH_SIZE;
use crate::error::ConfigError;
use crate::models::ChunkingOptions;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_DATABASE_PATH: &str = "documents.db";
pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Local,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::Invalid {
                key: "EMBEDDING_PROVIDER",
                details: format!("unknown provider `{other}` (expected gemini or local)"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub batch_size: usize,
    pub dimensions: Option<usize>,
}

impl EmbeddingSettings {
    /// Model resource name as the Generative Language API expects it.
    pub fn model_path(&self) -> String {
        let model = self.model.trim();
        if model.starts_with("models/") || model.starts_with("tunedModels/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            dimensions: None,
        }
    }
}

/// Process-wide configuration. Built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub database_path: PathBuf,
    pub top_k: usize,
    pub chunking: ChunkingOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding: EmbeddingSettings::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            top_k: DEFAULT_TOP_K,
            chunking: ChunkingOptions::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let embedding = &self.embedding;

        if embedding.provider == ProviderKind::Gemini {
            let has_key = embedding
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty());
            if !has_key {
                return Err(ConfigError::Missing("GEMINI_API_KEY"));
            }
            if embedding.model.trim().is_empty() {
                return Err(ConfigError::Missing("EMBEDDING_MODEL"));
            }
            Url::parse(&embedding.endpoint)?;
        }

        if embedding.batch_size == 0 || embedding.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid {
                key: "EMBEDDING_BATCH_SIZE",
                details: format!("{} is outside 1..={MAX_BATCH_SIZE}", embedding.batch_size),
            });
        }

        if embedding.dimensions == Some(0) {
            return Err(ConfigError::Invalid {
                key: "EMBEDDING_DIMENSIONS",
                details: "must be positive".to_string(),
            });
        }

        if self.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "DOCSEARCH_TOP_K",
                details: "must be positive".to_string(),
            });
        }

        if self.chunking.max_chunk_chars == 0 || self.chunking.query_segment_chars == 0 {
            return Err(ConfigError::Invalid {
                key: "chunking",
                details: "chunk limits must be positive".to_string(),
            });
        }

        Ok(())
    }
}
