use super::GenerativeBackend;
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use yojana_core::{YojanaError, YojanaResult};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        let request = if self.config.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        };

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/yojana-rag/yojana")
                .header("X-Title", "Yojana")
        } else {
            request
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiBackend {
    async fn generate(&self, prompt: &str) -> YojanaResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| YojanaError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| YojanaError::Http(format!("OpenAI response {status}: {e}")))?;

        if !status.is_success() {
            return Err(YojanaError::Http(format!(
                "OpenAI API error {}: {}",
                status, resp_body
            )));
        }

        parse_openai_response(&resp_body)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

pub fn parse_openai_response(body: &serde_json::Value) -> YojanaResult<String> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(YojanaError::GenerationUnavailable {
            transient: false,
            message: "OpenAI-compatible API returned an empty completion".to_string(),
        });
    }
    Ok(content.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: LlmProvider, base: &str, key: &str) -> ModelConfig {
        ModelConfig {
            provider,
            model_id: "gpt-4o-mini".into(),
            api_key: key.into(),
            api_base_url: Some(base.to_string()),
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generate_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Apply at the district office."},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(LlmProvider::OpenAi, &server.uri(), "sk-test"));
        assert_eq!(
            backend.generate("where?").await.unwrap(),
            "Apply at the district office."
        );
    }

    #[tokio::test]
    async fn test_openrouter_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Title", "Yojana"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(config(LlmProvider::OpenRouter, &server.uri(), "sk-or"));
        assert_eq!(backend.generate("q").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid API key"}
            })))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(LlmProvider::OpenAi, &server.uri(), "bad"));
        let err = backend.generate("q").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_completion_rejected() {
        let body = serde_json::json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(
            parse_openai_response(&body).unwrap_err(),
            YojanaError::GenerationUnavailable { transient: false, .. }
        ));
    }
}
