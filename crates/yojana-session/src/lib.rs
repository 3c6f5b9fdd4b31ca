//! Session storage for Yojana conversations.
//!
//! A session is an ordered, append-only log of [`ConversationTurn`]s plus a
//! small header (id, title, creation time). Stores assign turn sequence
//! numbers under a lock so each session has a stable total order.
//!
//! [`ConversationTurn`]: yojana_core::ConversationTurn

pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use session::{derive_title, NewTurn, SessionSummary, DEFAULT_TITLE};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
pub use store::{FileSessionStore, InMemorySessionStore, SessionStore};
