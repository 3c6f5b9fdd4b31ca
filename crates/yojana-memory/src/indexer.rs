use crate::embedding::EmbeddingProvider;
use crate::store::{IndexedVector, UpsertOutcome, VectorStore};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use yojana_core::{SchemeDocument, YojanaError, YojanaResult};

/// Documents embedded per `embed_batch` call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Documents in the corpus.
    pub total: usize,
    /// Documents embedded and written during this run.
    pub embedded: usize,
    /// Documents already present with identical content.
    pub unchanged: usize,
    /// True when the run was skipped because the store was populated.
    pub skipped: bool,
}

/// Ingests the scheme corpus into a vector store.
///
/// Every write is an upsert keyed by document id, so a run interrupted
/// halfway is completed by the next run and repeating a finished run writes
/// nothing.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index the corpus only if the store is empty.
    ///
    /// The store itself is the source of truth: a populated store (from this
    /// or an earlier process) means the loader is never called.
    pub async fn ensure_indexed<F, Fut>(&self, load_corpus: F) -> YojanaResult<IndexReport>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = YojanaResult<Vec<SchemeDocument>>> + Send,
    {
        let existing = self.store.count().await.map_err(unavailable)?;
        if existing > 0 {
            info!(documents = existing, "Schemes already indexed, skipping");
            return Ok(IndexReport {
                total: existing,
                unchanged: existing,
                skipped: true,
                ..IndexReport::default()
            });
        }

        let documents = load_corpus().await?;
        self.index(&documents).await
    }

    /// Upsert every document whose content differs from what is stored.
    pub async fn index(&self, documents: &[SchemeDocument]) -> YojanaResult<IndexReport> {
        let mut seen = HashSet::with_capacity(documents.len());
        for doc in documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(YojanaError::Corpus(format!(
                    "duplicate document id '{}'",
                    doc.id
                )));
            }
        }

        let mut report = IndexReport {
            total: documents.len(),
            ..IndexReport::default()
        };

        let fingerprint = self.embedder.fingerprint();
        let mut pending: Vec<&SchemeDocument> = Vec::new();
        let mut stale = 0usize;
        for doc in documents {
            let stored = self.store.get(&doc.id).await.map_err(unavailable)?;
            match stored {
                Some(entry) if entry.is_current(doc, &fingerprint) => report.unchanged += 1,
                Some(entry) if entry.embedder != fingerprint => {
                    stale += 1;
                    pending.push(doc);
                }
                _ => pending.push(doc),
            }
        }
        if stale > 0 {
            warn!(
                stale,
                embedder = %fingerprint,
                "Re-embedding entries produced by a different embedder"
            );
        }

        if pending.is_empty() {
            info!(total = report.total, "Index up to date");
            return Ok(report);
        }

        info!(
            pending = pending.len(),
            total = report.total,
            embedder = self.embedder.name(),
            "Indexing schemes"
        );

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|d| d.text.as_str()).collect();
            let vectors = self.embedder.embed_batch(&texts).await.map_err(unavailable)?;
            if vectors.len() != batch.len() {
                return Err(YojanaError::IndexingUnavailable(format!(
                    "embedder returned {} vectors for {} documents",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (doc, vector) in batch.iter().zip(vectors) {
                let outcome = self
                    .store
                    .upsert(IndexedVector::new((*doc).clone(), vector).with_embedder(&fingerprint))
                    .await
                    .map_err(unavailable)?;
                if outcome == UpsertOutcome::Unchanged {
                    warn!(id = %doc.id, "Stored entry matched after hash mismatch");
                }
                report.embedded += 1;
            }

            info!(
                indexed = report.unchanged + report.embedded,
                total = report.total,
                "Indexed schemes"
            );
        }

        info!(
            embedded = report.embedded,
            unchanged = report.unchanged,
            "Indexing complete"
        );
        Ok(report)
    }
}

fn unavailable(err: YojanaError) -> YojanaError {
    match err {
        YojanaError::IndexingUnavailable(_) => err,
        other => YojanaError::IndexingUnavailable(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::embedding::LocalEmbedding;
    use crate::store::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingEmbedding {
        inner: LocalEmbedding,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedding {
        async fn embed(&self, text: &str) -> YojanaResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedding {
        async fn embed(&self, _text: &str) -> YojanaResult<Vec<f32>> {
            Err(YojanaError::Embedding("connection refused".into()))
        }
        fn dimension(&self) -> usize {
            8
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    fn corpus() -> Vec<SchemeDocument> {
        vec![
            SchemeDocument::new("scheme_0", "Old age pension for destitute seniors"),
            SchemeDocument::new("scheme_1", "Free laptops for higher secondary students"),
            SchemeDocument::new("scheme_2", "Crop insurance for small farmers"),
        ]
    }

    fn counting() -> Arc<CountingEmbedding> {
        Arc::new(CountingEmbedding {
            inner: LocalEmbedding::default(),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_index_then_reindex_is_noop() {
        let embedder = counting();
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(embedder.clone(), store.clone()).with_batch_size(2);

        let first = indexer.index(&corpus()).await.unwrap();
        assert_eq!(first.embedded, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        let snapshot = store.list().await;

        let second = indexer.index(&corpus()).await.unwrap();
        assert_eq!(second.embedded, 0);
        assert_eq!(second.unchanged, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.list().await, snapshot);
    }

    #[tokio::test]
    async fn test_reindex_updates_only_changed_document() {
        let embedder = counting();
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(embedder.clone(), store.clone());
        indexer.index(&corpus()).await.unwrap();

        let mut changed = corpus();
        changed[1].text = "Free laptops and tablets for students".to_string();
        let report = indexer.index(&changed).await.unwrap();

        assert_eq!(report.embedded, 1);
        assert_eq!(report.unchanged, 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(store.count().await.unwrap(), 3);
        let stored = store.get("scheme_1").await.unwrap().unwrap();
        assert_eq!(stored.document.text, "Free laptops and tablets for students");
    }

    #[tokio::test]
    async fn test_ensure_indexed_skips_populated_store() {
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(Arc::new(LocalEmbedding::default()), store.clone());
        indexer.index(&corpus()).await.unwrap();

        let loader_called = Arc::new(AtomicBool::new(false));
        let flag = loader_called.clone();
        let report = indexer
            .ensure_indexed(move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(corpus())
            })
            .await
            .unwrap();
        assert!(report.skipped);
        assert!(!loader_called.load(Ordering::SeqCst));
        assert_eq!(report.total, 3);
    }

    #[tokio::test]
    async fn test_ensure_indexed_loads_when_empty() {
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(Arc::new(LocalEmbedding::default()), store.clone());
        let report = indexer
            .ensure_indexed(|| async { Ok(corpus()) })
            .await
            .unwrap();
        assert!(!report.skipped);
        assert_eq!(report.embedded, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_indexing_unavailable() {
        let store = Arc::new(InMemoryVectorStore::new());
        let indexer = Indexer::new(Arc::new(FailingEmbedding), store.clone());
        let err = indexer.index(&corpus()).await.unwrap_err();
        assert!(matches!(err, YojanaError::IndexingUnavailable(_)));
        assert!(err.is_retryable());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedder_change_reembeds_everything() {
        let store = Arc::new(InMemoryVectorStore::new());
        let docs = vec![SchemeDocument::new("s1", "Scholarship for disabled students")];
        Indexer::new(Arc::new(LocalEmbedding::new(384)), store.clone())
            .index(&docs)
            .await
            .unwrap();

        let smaller = Arc::new(LocalEmbedding::new(256));
        let report = Indexer::new(smaller.clone(), store.clone())
            .index(&docs)
            .await
            .unwrap();
        assert_eq!(report.embedded, 1);
        assert_eq!(report.unchanged, 0);

        let stored = store.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.vector.len(), 256);
        assert_eq!(stored.embedder, "local-bow/256");

        let query = smaller.embed("scholarship disabled students").await.unwrap();
        let hits = store.query(&query, 1).await.unwrap();
        assert!(hits[0].distance < 0.8);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let indexer = Indexer::new(
            Arc::new(LocalEmbedding::default()),
            Arc::new(InMemoryVectorStore::new()),
        );
        let docs = vec![
            SchemeDocument::new("scheme_0", "a"),
            SchemeDocument::new("scheme_0", "b"),
        ];
        assert!(matches!(
            indexer.index(&docs).await.unwrap_err(),
            YojanaError::Corpus(_)
        ));
    }
}
