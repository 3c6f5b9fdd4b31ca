use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use serde::Deserialize;
use yojana_core::{YojanaError, YojanaResult};

/// Embedding provider backed by an OpenAI-compatible `/v1/embeddings` API.
///
/// Works with OpenAI, text-embeddings-inference, Ollama and any server that
/// speaks the same request shape, e.g. one hosting `all-MiniLM-L6-v2`.
pub struct HttpEmbedding {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedding {
    /// Creates a provider for `model` at `base_url` producing `dimension`-wide vectors.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            dimension,
            http: reqwest::Client::new(),
        }
    }

    async fn request(&self, input: &[&str]) -> YojanaResult<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| YojanaError::Embedding(format!("connection to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(YojanaError::Embedding(format!(
                "Embedding API error {status}: {text}"
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| YojanaError::Embedding(format!("malformed embedding response: {e}")))?;

        if parsed.data.len() != input.len() {
            return Err(YojanaError::Embedding(format!(
                "expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }

        let mut items = parsed.data;
        items.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(items.len());
        for item in items {
            if item.embedding.len() != self.dimension {
                return Err(YojanaError::Embedding(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    item.embedding.len()
                )));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed(&self, text: &str) -> YojanaResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(YojanaError::Embedding("Cannot embed empty text".to_string()));
        }
        let mut vectors = self.request(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| YojanaError::Embedding("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> YojanaResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
