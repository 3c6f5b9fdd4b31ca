//! Core types and error definitions for the Yojana scheme assistant.
//!
//! This crate provides the types shared across all Yojana crates: the
//! scheme documents that get indexed, the conversation turns that sessions
//! are made of, the retrieval results that flow into answer synthesis, and
//! the unified error type.
//!
//! # Main types
//!
//! - [`YojanaError`]: Unified error enum, including the pipeline failure kinds.
//! - [`YojanaResult`]: Convenience alias for `Result<T, YojanaError>`.
//! - [`SchemeDocument`]: One indexed welfare scheme description.
//! - [`Role`]: Author of a turn (user or assistant).
//! - [`ConversationTurn`]: A single message within a session.
//! - [`RetrievalResult`]: A retrieved document with its embedding distance.

/// Error types.
pub mod error;

pub use error::{is_transient_message, YojanaError, YojanaResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// --- Documents ---

/// A welfare scheme description as stored in the vector index.
///
/// The `id` is stable across indexing runs so that re-indexing the same
/// corpus upserts rather than duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeDocument {
    /// Stable identifier, e.g. `scheme_12`.
    pub id: String,
    /// Serialized scheme description used for embedding and as evidence.
    pub text: String,
    /// Structured fields such as `scheme_name` and `department`.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SchemeDocument {
    /// Creates a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The scheme name from metadata, falling back to the document id.
    pub fn scheme_name(&self) -> &str {
        self.metadata
            .get("scheme_name")
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

/// A retrieved document and its distance from the query embedding.
///
/// Smaller distance means more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The matched document.
    pub document: SchemeDocument,
    /// Cosine distance between query and document embeddings.
    pub distance: f32,
}

impl RetrievalResult {
    /// Relevance as shown to the model: `1 - distance`.
    pub fn relevance(&self) -> f32 {
        1.0 - self.distance
    }
}

// --- Conversation ---

/// The author of a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking about schemes.
    User,
    /// The assistant's generated answer.
    Assistant,
}

impl Role {
    /// Lowercase name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = YojanaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(YojanaError::Session(format!("unknown role '{other}'"))),
        }
    }
}

/// One message within a session.
///
/// Turns are append-only. `seq` is assigned by the session store and is
/// strictly increasing within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Position of the turn within its session, starting at 1.
    pub seq: u64,
    /// Who authored the turn.
    pub role: Role,
    /// The message text.
    pub content: String,
    /// UTC time at which the turn was appended.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Creates a turn stamped with the current time.
    pub fn new(seq: u64, role: Role, content: impl Into<String>) -> Self {
        Self {
            seq,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a user turn.
    pub fn user(seq: u64, content: impl Into<String>) -> Self {
        Self::new(seq, Role::User, content)
    }

    /// Creates an assistant turn.
    pub fn assistant(seq: u64, content: impl Into<String>) -> Self {
        Self::new(seq, Role::Assistant, content)
    }
}
