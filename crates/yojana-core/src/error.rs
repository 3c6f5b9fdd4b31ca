use thiserror::Error;
use uuid::Uuid;

/// A convenience `Result` alias using [`YojanaError`].
pub type YojanaResult<T> = Result<T, YojanaError>;

/// Top-level error type for the Yojana workspace.
///
/// The first three variants are the failure kinds the query pipeline reports
/// to its caller. The remaining variants are raised by collaborators
/// (embedding, vector store, model backends, session store) and are mapped
/// onto a pipeline failure kind at the orchestration boundary.
#[derive(Error, Debug)]
pub enum YojanaError {
    /// The embedding service or vector store failed during an indexing run.
    /// The run can be repeated; upserts converge.
    #[error("Indexing unavailable: {0}")]
    IndexingUnavailable(String),

    /// The embedding service or vector store failed while answering a query.
    #[error("Retrieval failure: {0}")]
    RetrievalFailure(String),

    /// The generative model failed, timed out, or returned nothing usable.
    #[error("Generation unavailable: {message}")]
    GenerationUnavailable {
        /// Whether a later attempt may succeed (rate limit, timeout, 5xx).
        transient: bool,
        /// Upstream failure description.
        message: String,
    },

    /// An error computing embeddings.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An error reading or writing the vector store.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// An error from an outbound HTTP request (model or embedding API).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The requested session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// An error related to session persistence.
    #[error("Session error: {0}")]
    Session(String),

    /// The scheme corpus could not be read or is malformed.
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The caller supplied unusable input (e.g. an empty question).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl YojanaError {
    /// Whether repeating the failed operation later may succeed.
    ///
    /// Indexing failures are always retryable. Generation failures carry
    /// their own classification. HTTP errors are retryable for rate limits
    /// (429), timeouts and server errors (5xx), and not for other client
    /// errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            YojanaError::IndexingUnavailable(_) => true,
            YojanaError::GenerationUnavailable { transient, .. } => *transient,
            YojanaError::Http(msg) | YojanaError::RetrievalFailure(msg) => {
                is_transient_message(msg)
            }
            _ => false,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            YojanaError::IndexingUnavailable(_) => "indexing_unavailable",
            YojanaError::RetrievalFailure(_) => "retrieval_failure",
            YojanaError::GenerationUnavailable { .. } => "generation_unavailable",
            YojanaError::Embedding(_) => "embedding",
            YojanaError::VectorStore(_) => "vector_store",
            YojanaError::Http(_) => "http",
            YojanaError::SessionNotFound(_) => "session_not_found",
            YojanaError::Session(_) => "session",
            YojanaError::Corpus(_) => "corpus",
            YojanaError::Config(_) => "config",
            YojanaError::InvalidInput(_) => "invalid_input",
            YojanaError::Json(_) => "json",
            YojanaError::Io(_) => "io",
        }
    }
}

/// Classifies an upstream error message as transient.
///
/// Client errors such as 400 are checked first and never treated as
/// transient.
pub fn is_transient_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();

    if lower.contains("400") || lower.contains("401") || lower.contains("403") {
        return false;
    }

    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
}
