pub mod gemini;
pub mod hashing;

pub use gemini::GeminiEmbedder;
pub use hashing::{HashingEmbedder, DEFAULT_HASHING_DIMENSIONS};

use crate::config::{EmbeddingSettings, ProviderKind};
use crate::embeddings::EmbeddingClient;
use crate::error::{ConfigError, EmbeddingError};
use crate::traits::EmbeddingProvider;
use async_trait::async_trait;

/// Provider picked at runtime from `EmbeddingSettings::provider`.
pub enum ConfiguredEmbedder {
    Gemini(GeminiEmbedder),
    Local(HashingEmbedder),
}

impl ConfiguredEmbedder {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, ConfigError> {
        match settings.provider {
            ProviderKind::Gemini => Ok(Self::Gemini(GeminiEmbedder::new(settings)?)),
            ProviderKind::Local => Ok(Self::Local(HashingEmbedder::new(
                settings.dimensions.unwrap_or(DEFAULT_HASHING_DIMENSIONS),
            ))),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ConfiguredEmbedder {
    fn max_batch_size(&self) -> usize {
        match self {
            Self::Gemini(provider) => provider.max_batch_size(),
            Self::Local(provider) => provider.max_batch_size(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self {
            Self::Gemini(provider) => provider.embed_batch(texts).await,
            Self::Local(provider) => provider.embed_batch(texts).await,
        }
    }
}

pub fn embedding_client(
    settings: &EmbeddingSettings,
) -> Result<EmbeddingClient<ConfiguredEmbedder>, ConfigError> {
    let provider = ConfiguredEmbedder::from_settings(settings)?;
    Ok(EmbeddingClient::new(provider, settings.batch_size).with_expected_dimensions(settings.dimensions))
}
