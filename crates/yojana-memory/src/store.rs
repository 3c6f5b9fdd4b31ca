use crate::embedding::cosine_distance;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use yojana_core::{SchemeDocument, YojanaError, YojanaResult};

/// A document together with its embedding, as held by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: SchemeDocument,
    /// SHA-256 of the document text and metadata, see [`content_hash`].
    pub content_hash: String,
    /// [`EmbeddingProvider::fingerprint`](crate::EmbeddingProvider::fingerprint)
    /// of the provider that produced `vector`. Empty for entries written
    /// before it was recorded.
    #[serde(default)]
    pub embedder: String,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedVector {
    pub fn new(document: SchemeDocument, vector: Vec<f32>) -> Self {
        Self {
            id: document.id.clone(),
            content_hash: content_hash(&document),
            vector,
            document,
            embedder: String::new(),
            indexed_at: Utc::now(),
        }
    }

    pub fn with_embedder(mut self, fingerprint: impl Into<String>) -> Self {
        self.embedder = fingerprint.into();
        self
    }

    /// True when this entry was embedded from `document` by the provider
    /// with `fingerprint`.
    pub fn is_current(&self, document: &SchemeDocument, fingerprint: &str) -> bool {
        self.embedder == fingerprint && self.content_hash == content_hash(document)
    }

    fn same_content(&self, other: &IndexedVector) -> bool {
        self.content_hash == other.content_hash
            && self.embedder == other.embedder
            && self.vector == other.vector
    }
}

/// Hex SHA-256 over a document's text and its (sorted) metadata.
pub fn content_hash(document: &SchemeDocument) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.text.as_bytes());
    for (key, value) in &document.metadata {
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// A nearest-neighbour hit.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub document: SchemeDocument,
    pub distance: f32,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// An identical entry was already stored; nothing was written.
    Unchanged,
}

/// Trait for vector storage backends.
///
/// Upserts are keyed by id, so repeating one is convergent.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the entry with the same id.
    async fn upsert(&self, entry: IndexedVector) -> YojanaResult<UpsertOutcome>;

    /// Look up an entry by id.
    async fn get(&self, id: &str) -> YojanaResult<Option<IndexedVector>>;

    /// The `k` entries closest to `embedding`, ascending by cosine distance.
    async fn query(&self, embedding: &[f32], k: usize) -> YojanaResult<Vec<VectorMatch>>;

    /// Number of stored entries.
    async fn count(&self) -> YojanaResult<usize>;
}

/// In-memory vector store using brute-force cosine distance.
/// Suitable for corpora of a few thousand documents.
pub struct InMemoryVectorStore {
    entries: RwLock<BTreeMap<String, IndexedVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// All entries in id order.
    pub async fn list(&self) -> Vec<IndexedVector> {
        self.entries.read().await.values().cloned().collect()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, entry: IndexedVector) -> YojanaResult<UpsertOutcome> {
        let mut entries = self.entries.write().await;
        let outcome = match entries.get(&entry.id) {
            Some(existing) if existing.same_content(&entry) => return Ok(UpsertOutcome::Unchanged),
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };
        entries.insert(entry.id.clone(), entry);
        Ok(outcome)
    }

    async fn get(&self, id: &str) -> YojanaResult<Option<IndexedVector>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> YojanaResult<Vec<VectorMatch>> {
        if embedding.is_empty() {
            return Err(YojanaError::VectorStore("Empty query embedding".to_string()));
        }

        let entries = self.entries.read().await;
        if let Some(stale) = entries.values().find(|e| e.vector.len() != embedding.len()) {
            return Err(YojanaError::VectorStore(format!(
                "query has {} dimensions but entry '{}' has {}; re-index with the current embedder",
                embedding.len(),
                stale.id,
                stale.vector.len()
            )));
        }
        let mut scored: Vec<VectorMatch> = entries
            .values()
            .map(|e| VectorMatch {
                document: e.document.clone(),
                distance: cosine_distance(embedding, &e.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn count(&self) -> YojanaResult<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// File-backed vector store that persists entries as a JSONL log.
///
/// Every changed upsert appends one line; on load, later lines for the same
/// id replace earlier ones. [`FileVectorStore::compact`] rewrites the log
/// with one line per id.
pub struct FileVectorStore {
    path: PathBuf,
    inner: InMemoryVectorStore,
    write_lock: Mutex<()>,
}

impl FileVectorStore {
    /// Open the store at `path`, loading any existing log.
    pub async fn new(path: PathBuf) -> YojanaResult<Self> {
        let inner = InMemoryVectorStore::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                YojanaError::VectorStore(format!("Failed to read vector store: {e}"))
            })?;
            let mut lines = 0usize;
            for line in data.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: IndexedVector = serde_json::from_str(line).map_err(|e| {
                    YojanaError::VectorStore(format!("Invalid JSONL entry: {e}"))
                })?;
                inner.upsert(entry).await?;
                lines += 1;
            }
            info!(
                path = %path.display(),
                lines,
                entries = inner.count().await?,
                "Vector store loaded"
            );
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| YojanaError::VectorStore(format!("Failed to create dir: {e}")))?;
        }

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    async fn append_to_file(&self, entry: &IndexedVector) -> YojanaResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| YojanaError::VectorStore(format!("Failed to open vector store: {e}")))?;
        let mut line = serde_json::to_string(entry)
            .map_err(|e| YojanaError::VectorStore(format!("Failed to serialize entry: {e}")))?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| YojanaError::VectorStore(format!("Failed to write entry: {e}")))?;
        file.flush()
            .await
            .map_err(|e| YojanaError::VectorStore(format!("Failed to flush entry: {e}")))?;
        Ok(())
    }

    /// Rewrite the log so it holds exactly one line per id.
    pub async fn compact(&self) -> YojanaResult<()> {
        let _guard = self.write_lock.lock().await;
        let entries = self.inner.list().await;
        let mut data = String::new();
        for entry in &entries {
            let line = serde_json::to_string(entry)
                .map_err(|e| YojanaError::VectorStore(format!("Failed to serialize entry: {e}")))?;
            data.push_str(&line);
            data.push('\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| YojanaError::VectorStore(format!("Failed to write vector store: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| YojanaError::VectorStore(format!("Failed to replace vector store: {e}")))?;
        debug!(entries = entries.len(), "Vector store compacted");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn upsert(&self, entry: IndexedVector) -> YojanaResult<UpsertOutcome> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.inner.get(&entry.id).await? {
            if existing.same_content(&entry) {
                return Ok(UpsertOutcome::Unchanged);
            }
        }
        self.append_to_file(&entry).await?;
        self.inner.upsert(entry).await
    }

    async fn get(&self, id: &str) -> YojanaResult<Option<IndexedVector>> {
        self.inner.get(id).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> YojanaResult<Vec<VectorMatch>> {
        self.inner.query(embedding, k).await
    }

    async fn count(&self) -> YojanaResult<usize> {
        self.inner.count().await
    }
}
