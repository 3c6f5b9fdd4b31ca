#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests for the RAG pipeline: local embeddings, an in-memory
//! index, a file-backed session store and a scripted generative backend.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;
use uuid::Uuid;

use yojana_agent::synthesizer::NO_EVIDENCE_INSTRUCTION;
use yojana_agent::{
    AnswerSynthesizer, ContextWindow, GenerativeBackend, LlmClient, RagPipeline, Retriever,
};
use yojana_core::{ConversationTurn, Role, SchemeDocument, YojanaError, YojanaResult};
use yojana_memory::{EmbeddingProvider, Indexer, InMemoryVectorStore, LocalEmbedding};
use yojana_session::{
    FileSessionStore, InMemorySessionStore, NewTurn, SessionStore, SessionSummary, DEFAULT_TITLE,
};

const NOT_FOUND_REPLY: &str =
    "I could not find any relevant scheme information in the database for that question.";

/// Answers from the first evidence entry of the prompt, and records every
/// prompt it receives.
struct ScriptedBackend {
    prompts: Arc<Mutex<Vec<String>>>,
    fail_with: Option<String>,
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> YojanaResult<String> {
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(msg) = &self.fail_with {
            return Err(YojanaError::Http(msg.clone()));
        }
        if prompt.contains(NO_EVIDENCE_INSTRUCTION) {
            return Ok(NOT_FOUND_REPLY.to_string());
        }
        let first = prompt
            .split("--- Relevant Scheme 1")
            .nth(1)
            .and_then(|rest| rest.split_once("---\n"))
            .map(|(_, body)| body.split("\n\n").next().unwrap_or_default())
            .unwrap_or_default();
        Ok(format!("According to the schemes database: {first}"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    pipeline: RagPipeline,
    sessions: Arc<dyn SessionStore>,
    prompts: Arc<Mutex<Vec<String>>>,
    _tmp: TempDir,
}

fn corpus() -> Vec<SchemeDocument> {
    vec![
        SchemeDocument::new(
            "scheme_0",
            "Scheme X provides scholarships to disabled students, apply at district office",
        )
        .with_metadata("scheme_name", "Scheme X"),
        SchemeDocument::new(
            "scheme_1",
            "Uzhavar Pathukappu Thittam gives farmer subsidies and crop assistance to small \
             farmers, apply at the taluk office",
        )
        .with_metadata("scheme_name", "Uzhavar Pathukappu Thittam"),
        SchemeDocument::new("scheme_2", "Free bus passes for senior citizens in cities")
            .with_metadata("scheme_name", "Senior Citizen Bus Pass"),
    ]
}

async fn harness(fail_with: Option<&str>) -> Harness {
    harness_with(&corpus(), fail_with).await
}

async fn harness_with(documents: &[SchemeDocument], fail_with: Option<&str>) -> Harness {
    let tmp = TempDir::new().unwrap();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedding::default());
    let store = Arc::new(InMemoryVectorStore::new());
    Indexer::new(embedder.clone(), store.clone())
        .index(documents)
        .await
        .unwrap();

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let backend = ScriptedBackend {
        prompts: prompts.clone(),
        fail_with: fail_with.map(str::to_string),
    };
    let llm = Arc::new(LlmClient::from_backend(Box::new(backend)));
    let sessions: Arc<dyn SessionStore> = Arc::new(
        FileSessionStore::new(tmp.path().join("sessions"))
            .await
            .unwrap(),
    );

    let pipeline = RagPipeline::new(
        Retriever::new(embedder, store),
        AnswerSynthesizer::new(llm),
        sessions.clone(),
    )
    .with_context_window(ContextWindow::default());

    Harness {
        pipeline,
        sessions,
        prompts,
        _tmp: tmp,
    }
}

fn single_scheme() -> Vec<SchemeDocument> {
    vec![SchemeDocument::new(
        "s1",
        "Scheme X provides scholarships to disabled students, apply at district office",
    )]
}

#[tokio::test]
async fn single_scheme_corpus_answers_matching_question() {
    let question = "What scholarships exist for disabled students?";

    let store = Arc::new(InMemoryVectorStore::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedding::default());
    Indexer::new(embedder.clone(), store.clone())
        .index(&single_scheme())
        .await
        .unwrap();
    let results = Retriever::new(embedder, store).retrieve(question).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.id, "s1");
    assert!(results[0].distance < yojana_agent::retriever::DEFAULT_MAX_DISTANCE);

    let h = harness_with(&single_scheme(), None).await;
    let reply = h.pipeline.answer(None, question).await.unwrap();
    assert!(reply.answer.contains("scholarships"));
    assert!(reply.answer.contains("district office"));
    assert_eq!(reply.sources, vec!["s1".to_string()]);

    let prompts = h.prompts.lock().await;
    assert!(prompts[0].contains("--- Relevant Scheme 1 (Relevance:"));
    assert!(!prompts[0].contains(NO_EVIDENCE_INSTRUCTION));
}

#[tokio::test]
async fn single_scheme_corpus_rejects_unrelated_question() {
    let question = "What is the weather today?";

    let store = Arc::new(InMemoryVectorStore::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedding::default());
    Indexer::new(embedder.clone(), store.clone())
        .index(&single_scheme())
        .await
        .unwrap();
    let results = Retriever::new(embedder, store).retrieve(question).await.unwrap();
    assert!(results.is_empty());

    let h = harness_with(&single_scheme(), None).await;
    let reply = h.pipeline.answer(None, question).await.unwrap();
    assert_eq!(reply.answer, NOT_FOUND_REPLY);
    assert!(reply.sources.is_empty());

    let prompts = h.prompts.lock().await;
    assert!(prompts[0].contains(NO_EVIDENCE_INSTRUCTION));
    assert!(!prompts[0].contains("--- Relevant Scheme"));
}

#[tokio::test]
async fn relevant_question_is_answered_from_evidence() {
    let h = harness(None).await;
    let reply = h
        .pipeline
        .answer(None, "Which scholarships exist for disabled students?")
        .await
        .unwrap();

    assert!(reply.answer.contains("scholarships"));
    assert!(reply.answer.contains("district office"));
    assert_eq!(reply.sources, vec!["Scheme X".to_string()]);

    let turns = h.sessions.get_turns(reply.session_id).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "Which scholarships exist for disabled students?");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, reply.answer);
}

#[tokio::test]
async fn unrelated_question_gets_no_information_reply() {
    let h = harness(None).await;
    let reply = h
        .pipeline
        .answer(None, "What is the weather today?")
        .await
        .unwrap();

    assert_eq!(reply.answer, NOT_FOUND_REPLY);
    assert!(reply.sources.is_empty());

    let prompts = h.prompts.lock().await;
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(NO_EVIDENCE_INSTRUCTION));
    assert!(!prompts[0].contains("--- Relevant Scheme"));
}

#[tokio::test]
async fn follow_up_question_keeps_the_subject() {
    let h = harness(None).await;
    let first = h
        .pipeline
        .answer(None, "Tell me about farmer subsidies")
        .await
        .unwrap();
    assert_eq!(first.sources, vec!["Uzhavar Pathukappu Thittam".to_string()]);

    let second = h
        .pipeline
        .answer(Some(first.session_id), "Where do I apply?")
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.sources[0], "Uzhavar Pathukappu Thittam");
    assert!(second.answer.contains("taluk office"));

    let prompts = h.prompts.lock().await;
    let follow_up = &prompts[1];
    // Folded query "Tell me about farmer subsidies Where do I apply?".
    assert!(follow_up.contains("--- Relevant Scheme 1 (Relevance: 0.59) ---\nUzhavar"));
    assert!(follow_up.contains("User: Tell me about farmer subsidies"));
    assert!(follow_up.contains("User Question: Where do I apply?"));

    let turns = h.sessions.get_turns(first.session_id).await.unwrap();
    assert_eq!(turns.len(), 4);
    assert!(turns.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[tokio::test]
async fn first_exchange_sets_session_title() {
    let h = harness(None).await;
    let session = h.sessions.create_session(None).await.unwrap();
    assert_eq!(session.title, DEFAULT_TITLE);

    let question = "Which scholarships exist for disabled students studying in colleges?";
    h.pipeline.answer(Some(session.id), question).await.unwrap();
    let title = h.sessions.get_session(session.id).await.unwrap().unwrap().title;
    assert_eq!(title, format!("{}...", &question[..50]));

    h.pipeline
        .answer(Some(session.id), "Tell me about farmer subsidies")
        .await
        .unwrap();
    let unchanged = h.sessions.get_session(session.id).await.unwrap().unwrap().title;
    assert_eq!(unchanged, title);
}

#[tokio::test]
async fn generation_failure_appends_nothing() {
    let h = harness(Some("503 Service Unavailable")).await;
    let session = h.sessions.create_session(None).await.unwrap();

    let err = h
        .pipeline
        .answer(Some(session.id), "Which scholarships exist for disabled students?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        YojanaError::GenerationUnavailable { transient: true, .. }
    ));
    assert!(h.sessions.get_turns(session.id).await.unwrap().is_empty());
    let title = h.sessions.get_session(session.id).await.unwrap().unwrap().title;
    assert_eq!(title, DEFAULT_TITLE);
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let h = harness(None).await;
    let ghost = uuid::Uuid::new_v4();
    let err = h.pipeline.answer(Some(ghost), "pension").await.unwrap_err();
    assert!(matches!(err, YojanaError::SessionNotFound(id) if id == ghost));
    assert!(h.prompts.lock().await.is_empty());
}

#[tokio::test]
async fn blank_message_is_invalid_input() {
    let h = harness(None).await;
    let err = h.pipeline.answer(None, "   ").await.unwrap_err();
    assert!(matches!(err, YojanaError::InvalidInput(_)));
    assert!(h.sessions.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn different_sessions_answer_concurrently() {
    let h = Arc::new(harness(None).await);
    let a = {
        let h = h.clone();
        tokio::spawn(async move {
            h.pipeline
                .answer(None, "Which scholarships exist for disabled students?")
                .await
        })
    };
    let b = {
        let h = h.clone();
        tokio::spawn(async move { h.pipeline.answer(None, "Tell me about farmer subsidies").await })
    };
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_ne!(a.session_id, b.session_id);
    assert_eq!(h.sessions.list_sessions().await.unwrap().len(), 2);
    assert_eq!(h.sessions.get_turns(a.session_id).await.unwrap().len(), 2);
    assert_eq!(h.sessions.get_turns(b.session_id).await.unwrap().len(), 2);
}

/// Session store whose renames always fail.
#[derive(Default)]
struct NoRenameStore {
    inner: InMemorySessionStore,
}

#[async_trait]
impl SessionStore for NoRenameStore {
    async fn create_session(&self, title: Option<&str>) -> YojanaResult<SessionSummary> {
        self.inner.create_session(title).await
    }
    async fn get_session(&self, id: Uuid) -> YojanaResult<Option<SessionSummary>> {
        self.inner.get_session(id).await
    }
    async fn list_sessions(&self) -> YojanaResult<Vec<SessionSummary>> {
        self.inner.list_sessions().await
    }
    async fn rename_session(&self, _id: Uuid, _title: &str) -> YojanaResult<()> {
        Err(YojanaError::Session("disk full".into()))
    }
    async fn delete_session(&self, id: Uuid) -> YojanaResult<()> {
        self.inner.delete_session(id).await
    }
    async fn append_turns(
        &self,
        id: Uuid,
        turns: &[NewTurn],
    ) -> YojanaResult<Vec<ConversationTurn>> {
        self.inner.append_turns(id, turns).await
    }
    async fn get_turns(&self, id: Uuid) -> YojanaResult<Vec<ConversationTurn>> {
        self.inner.get_turns(id).await
    }
}

#[tokio::test]
async fn title_failure_still_returns_recorded_answer() {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbedding::default());
    let store = Arc::new(InMemoryVectorStore::new());
    Indexer::new(embedder.clone(), store.clone())
        .index(&single_scheme())
        .await
        .unwrap();
    let backend = ScriptedBackend {
        prompts: Arc::new(Mutex::new(Vec::new())),
        fail_with: None,
    };
    let sessions: Arc<dyn SessionStore> = Arc::new(NoRenameStore::default());
    let pipeline = RagPipeline::new(
        Retriever::new(embedder, store),
        AnswerSynthesizer::new(Arc::new(LlmClient::from_backend(Box::new(backend)))),
        sessions.clone(),
    );

    let reply = pipeline
        .answer(None, "What scholarships exist for disabled students?")
        .await
        .unwrap();
    assert!(reply.answer.contains("district office"));

    let turns = sessions.get_turns(reply.session_id).await.unwrap();
    assert_eq!(turns.len(), 2);
    let session = sessions.get_session(reply.session_id).await.unwrap().unwrap();
    assert_eq!(session.title, DEFAULT_TITLE);
}
