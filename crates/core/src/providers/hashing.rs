use crate::error::EmbeddingError;
use crate::traits::EmbeddingProvider;
use crate::vector::vector_norm;
use async_trait::async_trait;

pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;
/// Whole-word features count more than the trigrams inside them.
const WORD_WEIGHT: f32 = 2.0;

/// Offline embedder using signed feature hashing. Each word contributes
/// itself plus its boundary-marked trigrams (`<pu`, `pum`, `ump`, `mp>`),
/// so inflections of the same stem land close together without a network
/// call.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Text without any alphanumeric word embeds to the zero vector, which
    /// search never matches.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];

        for word in words(text) {
            self.add_feature(&mut vector, word.as_bytes(), WORD_WEIGHT);

            let marked = format!("<{word}>").chars().collect::<Vec<_>>();
            for trigram in marked.windows(3) {
                let feature = trigram.iter().collect::<String>();
                self.add_feature(&mut vector, feature.as_bytes(), 1.0);
            }
        }

        let norm = vector_norm(&vector) as f32;
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimensions as u64) as usize;
        // Top bit picks the sign so colliding features tend to cancel.
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::HashingEmbedder;
    use crate::traits::EmbeddingProvider;
    use crate::vector::{cosine_similarity, vector_norm};

    #[tokio::test]
    async fn batch_output_follows_input_order() {
        let embedder = HashingEmbedder::new(64);
        let texts = vec![
            "prime the pump".to_string(),
            "quarterly revenue".to_string(),
            "prime the pump".to_string(),
        ];

        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], embedder.embed("prime the pump"));
        assert_eq!(vectors[1], embedder.embed("quarterly revenue"));
        assert_eq!(vectors[0], vectors[2]);
        assert!(vectors.iter().all(|vector| vector.len() == 64));
    }

    #[test]
    fn case_and_punctuation_do_not_change_the_vector() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed("Seal, pump; VALVE!"),
            embedder.embed("seal pump valve")
        );
    }

    #[test]
    fn wordless_text_is_the_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let vector = embedder.embed(" -- ... ");
        assert_eq!(vector, vec![0.0; 16]);
        assert_eq!(vector_norm(&vector), 0.0);
    }

    #[test]
    fn non_empty_vectors_are_unit_length() {
        let vector = HashingEmbedder::default().embed("Inspect every seal weekly");
        assert!((vector_norm(&vector) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_dimensions_are_raised_to_one() {
        assert_eq!(HashingEmbedder::new(0).dimensions(), 1);
    }

    #[test]
    fn shared_stems_score_higher_than_unrelated_text() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("replacing hydraulic filters");
        let related = embedder.embed("How to replace a hydraulic filter cartridge");
        let unrelated = embedder.embed("Quarterly revenue grew in the northern region");

        let related_score = cosine_similarity(&query, &related).unwrap();
        let unrelated_score = cosine_similarity(&query, &unrelated).unwrap();
        assert!(related_score > unrelated_score);
    }
}
