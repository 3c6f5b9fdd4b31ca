pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use yojana_core::YojanaResult;

/// Trait for generative model backends.
///
/// A backend takes one fully-built prompt and returns the model's text
/// completion. Conversation state is folded into the prompt by the caller.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `GenerativeBackend` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in `LlmClient::new()` in `llm.rs`
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Single non-streaming completion.
    async fn generate(&self, prompt: &str) -> YojanaResult<String>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}
