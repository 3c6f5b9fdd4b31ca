//! Scheme indexing: embeddings, vector storage and corpus ingestion.
//!
//! Provides the embedding and vector-index collaborators used by the query
//! pipeline, the loader for the scheme corpus file, and the idempotent
//! [`Indexer`] that keeps the vector store in sync with the corpus.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`]: Trait mapping text to a fixed-length vector.
//! - [`LocalEmbedding`]: Hashed bag-of-words embedding, no network needed.
//! - [`VectorStore`]: Trait for upsert / nearest-neighbour / count.
//! - [`InMemoryVectorStore`] and [`FileVectorStore`]: Brute-force cosine stores.
//! - [`Indexer`]: Upserts the corpus, re-embedding only changed documents.
//! - [`SchemeRecord`]: One record of the scheme corpus file.

/// Scheme corpus parsing.
pub mod corpus;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// OpenAI-compatible HTTP embedding provider.
#[cfg(feature = "http-embeddings")]
pub mod http_embedding;
/// Corpus indexing into a vector store.
pub mod indexer;
/// Vector store trait and implementations.
pub mod store;

pub use corpus::{load_corpus, parse_corpus, SchemeRecord};
pub use embedding::{cosine_distance, EmbeddingProvider, LocalEmbedding};
#[cfg(feature = "http-embeddings")]
pub use http_embedding::HttpEmbedding;
pub use indexer::{IndexReport, Indexer};
pub use store::{
    content_hash, FileVectorStore, InMemoryVectorStore, IndexedVector, UpsertOutcome,
    VectorMatch, VectorStore,
};
