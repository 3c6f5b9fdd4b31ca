use crate::backends::gemini::GeminiBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::GenerativeBackend;
use crate::config::{LlmProvider, ModelConfig};
use yojana_core::YojanaResult;

/// Generative model client that dispatches to the configured backend.
pub struct LlmClient {
    backend: Box<dyn GenerativeBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        let backend: Box<dyn GenerativeBackend> = match config.provider {
            LlmProvider::Gemini => Box::new(GeminiBackend::new(config)),
            LlmProvider::OpenAi
            | LlmProvider::OpenRouter
            | LlmProvider::Groq
            | LlmProvider::Ollama => Box::new(OpenAiBackend::new(config)),
        };
        Self { backend }
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Box<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, prompt: &str) -> YojanaResult<String> {
        self.backend.generate(prompt).await
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_provider() {
        let gemini = LlmClient::new(ModelConfig::default());
        assert_eq!(gemini.backend_name(), "gemini");

        let ollama = LlmClient::new(ModelConfig {
            provider: LlmProvider::Ollama,
            ..ModelConfig::default()
        });
        assert_eq!(ollama.backend_name(), "openai");
    }
}
