use super::GenerativeBackend;
use crate::config::ModelConfig;
use async_trait::async_trait;
use yojana_core::{YojanaError, YojanaResult};

/// Google Gemini backend (`models/{model}:generateContent`).
pub struct GeminiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        let model = self
            .config
            .model_id
            .strip_prefix("models/")
            .unwrap_or(&self.config.model_id);
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            model
        )
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> YojanaResult<String> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            }
        });

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| YojanaError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| YojanaError::Http(format!("Gemini response {status}: {e}")))?;

        if !status.is_success() {
            return Err(YojanaError::Http(format!(
                "Gemini API error {}: {}",
                status, resp_body
            )));
        }

        parse_gemini_response(&resp_body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Concatenate the text parts of the first candidate.
pub fn parse_gemini_response(body: &serde_json::Value) -> YojanaResult<String> {
    let candidate = &body["candidates"][0];
    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate["finishReason"]
            .as_str()
            .or_else(|| body["promptFeedback"]["blockReason"].as_str())
            .unwrap_or("no candidates");
        return Err(YojanaError::GenerationUnavailable {
            transient: false,
            message: format!("Gemini returned no text ({reason})"),
        });
    }
    Ok(text)
}
