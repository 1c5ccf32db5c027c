use crate::config::{EmbeddingSettings, MAX_BATCH_SIZE};
use crate::error::{ConfigError, EmbeddingError};
use crate::traits::EmbeddingProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

/// Client for the Generative Language `batchEmbedContents` endpoint.
pub struct GeminiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimensions: Option<usize>,
}

impl GeminiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, ConfigError> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        Ok(Self {
            client: Client::new(),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model_path(),
            api_key: api_key.to_string(),
            dimensions: settings.dimensions,
        })
    }

    fn batch_url(&self) -> String {
        format!("{}/{}:batchEmbedContents", self.endpoint, self.model)
    }

    fn build_request<'a>(&'a self, texts: &'a [String]) -> BatchEmbedRequest<'a> {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    output_dimensionality: self.dimensions,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let response = self
            .client
            .post(self.batch_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.build_request(texts))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let details = response.text().await.unwrap_or_default();
            warn!(model = %self.model, "embedding provider rate limited the request");
            return Err(EmbeddingError::RateLimited(details));
        }

        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider {
                status: status.as_u16(),
                details,
            });
        }

        let body = response.text().await?;
        parse_batch_response(&body)
    }
}

fn parse_batch_response(body: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let parsed: BatchEmbedResponse = serde_json::from_str(body)
        .map_err(|error| EmbeddingError::MalformedResponse(error.to_string()))?;

    Ok(parsed
        .embeddings
        .into_iter()
        .map(|embedding| embedding.values)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmbeddingSettings {
        EmbeddingSettings {
            api_key: Some("secret".to_string()),
            endpoint: "https://example.test/v1beta/".to_string(),
            ..EmbeddingSettings::default()
        }
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let result = GeminiEmbedder::new(&EmbeddingSettings::default());
        assert!(matches!(result, Err(ConfigError::Missing("GEMINI_API_KEY"))));
    }

    #[test]
    fn batch_url_uses_the_model_resource_name() {
        let embedder = GeminiEmbedder::new(&settings()).unwrap();
        assert_eq!(
            embedder.batch_url(),
            "https://example.test/v1beta/models/text-embedding-004:batchEmbedContents"
        );
    }

    #[test]
    fn request_body_has_one_entry_per_text() {
        let embedder = GeminiEmbedder::new(&settings()).unwrap();
        let texts = vec!["first".to_string(), "second".to_string()];
        let body = serde_json::to_value(embedder.build_request(&texts)).unwrap();

        assert_eq!(body["requests"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["requests"][1]["model"], "models/text-embedding-004");
        assert_eq!(body["requests"][1]["content"]["parts"][0]["text"], "second");
        assert!(body["requests"][0].get("outputDimensionality").is_none());
    }

    #[test]
    fn configured_dimensions_are_requested() {
        let mut settings = settings();
        settings.dimensions = Some(256);
        let embedder = GeminiEmbedder::new(&settings).unwrap();
        let texts = vec!["only".to_string()];
        let body = serde_json::to_value(embedder.build_request(&texts)).unwrap();

        assert_eq!(body["requests"][0]["outputDimensionality"], 256);
    }

    #[test]
    fn response_vectors_keep_their_order() {
        let body = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
        let vectors = parse_batch_response(body).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn garbage_response_is_malformed() {
        let result = parse_batch_response("<html>oops</html>");
        assert!(matches!(result, Err(EmbeddingError::MalformedResponse(_))));
    }
}
