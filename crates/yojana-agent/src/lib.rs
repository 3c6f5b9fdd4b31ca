//! Retrieval-augmented answering for Yojana.
//!
//! A user turn flows through the [`ContextWindow`] (retrieval query and
//! conversation tail), the [`Retriever`] (nearest schemes under a distance
//! cut-off) and the [`AnswerSynthesizer`] (one grounded model call), and is
//! recorded in the session store by the [`RagPipeline`].

pub mod backends;
pub mod config;
pub mod context;
pub mod llm;
pub mod pipeline;
pub mod retriever;
pub mod synthesizer;

pub use backends::GenerativeBackend;
pub use config::{LlmProvider, ModelConfig};
pub use context::ContextWindow;
pub use llm::LlmClient;
pub use pipeline::{PipelineAnswer, RagPipeline};
pub use retriever::Retriever;
pub use synthesizer::{build_prompt, AnswerSynthesizer};
