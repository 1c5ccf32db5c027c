use crate::error::EmbeddingError;
use crate::traits::EmbeddingProvider;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Splits work into provider-sized batches and checks that every response
/// carries one vector per input with a single, consistent dimension.
pub struct EmbeddingClient<P> {
    provider: P,
    batch_size: usize,
    expected_dimensions: Option<usize>,
}

impl<P> EmbeddingClient<P>
where
    P: EmbeddingProvider + Send + Sync,
{
    pub fn new(provider: P, batch_size: usize) -> Self {
        let batch_size = batch_size.clamp(1, provider.max_batch_size().max(1));
        Self {
            provider,
            batch_size,
            expected_dimensions: None,
        }
    }

    pub fn with_expected_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.expected_dimensions = dimensions;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let total_batches = texts.len().div_ceil(self.batch_size);
        info!(
            texts = texts.len(),
            batches = total_batches,
            batch_size = self.batch_size,
            "generating embeddings"
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        let mut dimensions = self.expected_dimensions;

        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                batch = batch_number + 1,
                of = total_batches,
                size = batch.len(),
                "embedding batch"
            );

            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }

            for vector in &vectors {
                let expected = *dimensions.get_or_insert(vector.len());
                if vector.is_empty() || vector.len() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                if vector.iter().any(|value| !value.is_finite()) {
                    return Err(EmbeddingError::MalformedResponse(
                        "embedding contains NaN or infinite values".to_string(),
                    ));
                }
            }

            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingProvider {
        max_batch: usize,
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn max_batch_size(&self) -> usize {
            self.max_batch
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|text| vec![text.len() as f32, 1.0])
                .collect())
        }
    }

    struct NanProvider;

    #[async_trait]
    impl EmbeddingProvider for NanProvider {
        fn max_batch_size(&self) -> usize {
            100
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.5, f32::NAN, 0.5]).collect())
        }
    }

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn max_batch_size(&self) -> usize {
            100
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(index, _)| vec![1.0; index + 1])
                .collect())
        }
    }

    fn texts(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("chunk {index}")).collect()
    }

    #[tokio::test]
    async fn texts_are_sent_in_bounded_batches_in_order() {
        let client = EmbeddingClient::new(
            RecordingProvider {
                max_batch: 100,
                calls: Mutex::new(Vec::new()),
            },
            10,
        );

        let input = texts(23);
        let vectors = client.embed_texts(&input).await.unwrap();

        assert_eq!(vectors.len(), 23);
        assert_eq!(vectors[22][0], "chunk 22".len() as f32);
        assert_eq!(*client.provider().calls.lock().unwrap(), vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn batch_size_is_capped_by_provider_limit() {
        let client = EmbeddingClient::new(
            RecordingProvider {
                max_batch: 4,
                calls: Mutex::new(Vec::new()),
            },
            10,
        );
        assert_eq!(client.batch_size(), 4);
    }

    #[tokio::test]
    async fn inconsistent_dimensions_fail() {
        let client = EmbeddingClient::new(ShortProvider, 10);
        let result = client.embed_texts(&texts(2)).await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn non_finite_vectors_are_rejected() {
        let client = EmbeddingClient::new(NanProvider, 10);
        let result = client.embed_texts(&texts(3)).await;
        assert!(matches!(result, Err(EmbeddingError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn configured_dimension_is_enforced() {
        let client = EmbeddingClient::new(
            RecordingProvider {
                max_batch: 10,
                calls: Mutex::new(Vec::new()),
            },
            10,
        )
        .with_expected_dimensions(Some(768));

        let result = client.embed_query("pump").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::DimensionMismatch {
                expected: 768,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let client = EmbeddingClient::new(ShortProvider, 10);
        assert!(matches!(
            client.embed_texts(&[]).await,
            Err(EmbeddingError::EmptyInput)
        ));
    }
}
