use crate::context::ContextWindow;
use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use yojana_core::{YojanaError, YojanaResult};
use yojana_session::{derive_title, NewTurn, SessionStore};

/// Result of one answered user turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineAnswer {
    /// The session the turn was recorded in, created if none was given.
    pub session_id: Uuid,
    pub answer: String,
    /// Names of the schemes supplied as evidence, closest first.
    pub sources: Vec<String>,
}

/// Request-scoped retrieval-augmented answering.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct RagPipeline {
    context: ContextWindow,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    sessions: Arc<dyn SessionStore>,
}

impl RagPipeline {
    pub fn new(
        retriever: Retriever,
        synthesizer: AnswerSynthesizer,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            context: ContextWindow::default(),
            retriever,
            synthesizer,
            sessions,
        }
    }

    pub fn with_context_window(mut self, context: ContextWindow) -> Self {
        self.context = context;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Answer `message` within a session.
    ///
    /// `None` starts a new session. The user turn and the answer are
    /// appended together only after generation succeeds; a failed turn
    /// leaves the session untouched.
    pub async fn answer(
        &self,
        session_id: Option<Uuid>,
        message: &str,
    ) -> YojanaResult<PipelineAnswer> {
        let message = message.trim();
        if message.is_empty() {
            return Err(YojanaError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let session_id = match session_id {
            Some(id) => {
                self.sessions
                    .get_session(id)
                    .await?
                    .ok_or(YojanaError::SessionNotFound(id))?
                    .id
            }
            None => {
                let created = self.sessions.create_session(None).await?;
                info!(session_id = %created.id, "Session created for chat");
                created.id
            }
        };

        let history = self.sessions.get_turns(session_id).await?;
        let query = self.context.retrieval_query(&history, message);
        let tail = self.context.conversation_tail(&history);

        let evidence = self.retriever.retrieve(&query).await.inspect_err(|e| {
            warn!(session_id = %session_id, error = %e, "Retrieval failed");
        })?;
        if evidence.is_empty() {
            info!(session_id = %session_id, "No relevant schemes found");
        }

        let answer = self.synthesizer.synthesize(&evidence, message, tail).await?;

        self.sessions
            .append_turns(
                session_id,
                &[NewTurn::user(message), NewTurn::assistant(answer.as_str())],
            )
            .await?;
        // The turn is already recorded; a failed rename must not report it as lost.
        if history.is_empty() {
            if let Err(e) = self
                .sessions
                .rename_session(session_id, &derive_title(message))
                .await
            {
                warn!(session_id = %session_id, error = %e, "Failed to set session title");
            }
        }

        let mut sources: Vec<String> = Vec::with_capacity(evidence.len());
        for result in &evidence {
            let name = result.document.scheme_name();
            if !sources.iter().any(|s| s == name) {
                sources.push(name.to_string());
            }
        }

        info!(
            session_id = %session_id,
            evidence = evidence.len(),
            prior_turns = history.len(),
            "Answered user turn"
        );
        Ok(PipelineAnswer {
            session_id,
            answer,
            sources,
        })
    }
}
