use crate::llm::LlmClient;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use yojana_core::{
    is_transient_message, ConversationTurn, RetrievalResult, Role, YojanaError, YojanaResult,
};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Heading of each evidence entry in the prompt.
pub const EVIDENCE_HEADING: &str = "Relevant Scheme";

/// Instruction placed in the prompt when retrieval found nothing.
pub const NO_EVIDENCE_INSTRUCTION: &str = "No relevant scheme information was found in the \
database for this question. Tell the user that no relevant scheme information was found in \
the database, and do not describe or invent any scheme.";

const ROLE_PREAMBLE: &str = "You are a helpful assistant specializing in Indian government \
welfare schemes, particularly Tamil Nadu state schemes and all-India central schemes. Your \
role is to give accurate, detailed information about government schemes based ONLY on the \
context provided below.";

const RULES: &str = "CRITICAL RULES:
1. ONLY use information from the context provided below. Do not make up or add information.
2. If the answer is not in the context, clearly say that you do not have information about it in the provided schemes database.
3. Be specific and cite exact scheme names from the context.
4. Copy eligibility, benefits and application process details accurately from the context.
5. Format your response in clear, well-structured markdown, with tables where appropriate.
6. If several relevant schemes are found, compare them to help the user choose.
7. If the user asks a follow-up question (such as \"where do I apply?\" or \"what documents are needed?\"), answer about the SAME schemes discussed earlier in the conversation, not about different schemes.";

const FOLLOW_UP_NOTE: &str = "NOTE: This is a follow-up question in an ongoing conversation. \
Answer about the schemes already being discussed, not new unrelated schemes.";

const CLOSING: &str = "Please answer based ONLY on the schemes provided in the context above.";

/// Build the grounded prompt for one user question.
///
/// Evidence entries keep their retrieval order and carry their relevance
/// (`1 - distance`). Empty evidence replaces the evidence block with an
/// explicit no-information instruction.
pub fn build_prompt(
    evidence: &[RetrievalResult],
    question: &str,
    tail: &[ConversationTurn],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(ROLE_PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(RULES);
    prompt.push_str("\n\nContext from relevant government schemes:\n\n");

    if evidence.is_empty() {
        prompt.push_str(NO_EVIDENCE_INSTRUCTION);
    } else {
        let blocks: Vec<String> = evidence
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "--- {EVIDENCE_HEADING} {} (Relevance: {:.2}) ---\n{}",
                    i + 1,
                    r.relevance(),
                    r.document.text
                )
            })
            .collect();
        prompt.push_str(&blocks.join("\n\n"));
    }

    if !tail.is_empty() {
        prompt.push_str("\n\n---\n\nConversation so far:\n");
        for turn in tail {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(prompt, "{speaker}: {}", turn.content);
        }
    }

    prompt.push_str("\n\n---\n\n");
    let _ = write!(prompt, "User Question: {question}");
    if !tail.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(FOLLOW_UP_NOTE);
    }
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING);
    prompt
}

/// Produces the answer text from evidence with a single bounded model call.
pub struct AnswerSynthesizer {
    llm: Arc<LlmClient>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self {
            llm,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate an answer. The completion is returned verbatim.
    ///
    /// Every failure, including the timeout, becomes
    /// [`YojanaError::GenerationUnavailable`]. Nothing is retried here.
    pub async fn synthesize(
        &self,
        evidence: &[RetrievalResult],
        question: &str,
        tail: &[ConversationTurn],
    ) -> YojanaResult<String> {
        let prompt = build_prompt(evidence, question, tail);
        info!(
            backend = self.llm.backend_name(),
            evidence = evidence.len(),
            tail = tail.len(),
            prompt_chars = prompt.len(),
            "Generating answer"
        );

        match tokio::time::timeout(self.timeout, self.llm.generate(&prompt)).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(err)) => {
                let err = unavailable(err);
                warn!(error = %err, "Generation failed");
                Err(err)
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Generation timed out");
                Err(YojanaError::GenerationUnavailable {
                    transient: true,
                    message: format!("model did not respond within {:?}", self.timeout),
                })
            }
        }
    }
}

fn unavailable(err: YojanaError) -> YojanaError {
    match err {
        YojanaError::GenerationUnavailable { .. } => err,
        other => {
            let message = other.to_string();
            YojanaError::GenerationUnavailable {
                transient: is_transient_message(&message),
                message,
            }
        }
    }
}
