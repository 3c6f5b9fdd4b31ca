use std::sync::Arc;
use tracing::debug;
use yojana_core::{RetrievalResult, YojanaError, YojanaResult};
use yojana_memory::{EmbeddingProvider, VectorStore};

pub const DEFAULT_TOP_K: usize = 10;
/// Cosine-distance cut-off calibrated for the local bag-of-words embedder.
pub const DEFAULT_MAX_DISTANCE: f32 = 0.8;

/// Nearest-neighbour lookup over the scheme index with a relevance floor.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    max_distance: f32,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            top_k: DEFAULT_TOP_K,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Up to `top_k` documents with `distance <= max_distance`, closest first.
    ///
    /// An empty result means no evidence was found and is not an error.
    pub async fn retrieve(&self, query: &str) -> YojanaResult<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await.map_err(failure)?;
        let matches = self
            .store
            .query(&embedding, self.top_k)
            .await
            .map_err(failure)?;

        let candidates = matches.len();
        let mut results: Vec<RetrievalResult> = matches
            .into_iter()
            .filter(|m| m.distance <= self.max_distance)
            .map(|m| RetrievalResult {
                document: m.document,
                distance: m.distance,
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!(
            candidates,
            kept = results.len(),
            max_distance = self.max_distance,
            "Retrieved schemes"
        );
        Ok(results)
    }
}

fn failure(err: YojanaError) -> YojanaError {
    match err {
        YojanaError::RetrievalFailure(_) => err,
        other => YojanaError::RetrievalFailure(other.to_string()),
    }
}
