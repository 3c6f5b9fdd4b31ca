use crate::config::{EmbeddingBackend, SessionBackend, YojanaConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use yojana_agent::{AnswerSynthesizer, ContextWindow, LlmClient, RagPipeline, Retriever};
use yojana_memory::{
    load_corpus, EmbeddingProvider, FileVectorStore, IndexReport, Indexer, LocalEmbedding,
};
use yojana_session::{FileSessionStore, SessionStore};

/// Everything a command needs, built once from the config.
pub struct Components {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vectors: Arc<FileVectorStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Components {
    pub async fn open(config: &YojanaConfig) -> anyhow::Result<Self> {
        let embedder = build_embedder(config)?;
        let vectors = Arc::new(FileVectorStore::new(config.vector_store_path()).await?);
        let sessions = open_sessions(config).await?;
        info!(
            embedder = embedder.name(),
            data_dir = %config.data_dir.display(),
            "Components ready"
        );
        Ok(Self {
            embedder,
            vectors,
            sessions,
        })
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.embedder.clone(), self.vectors.clone())
    }

    /// Index the corpus unless the store already holds documents.
    pub async fn ensure_indexed(&self, config: &YojanaConfig) -> anyhow::Result<IndexReport> {
        let path = config.corpus.path.clone();
        let report = self
            .indexer()
            .ensure_indexed(|| async move { load_corpus(&path).await })
            .await?;
        Ok(report)
    }

    pub fn pipeline(&self, config: &YojanaConfig) -> RagPipeline {
        let retriever = Retriever::new(self.embedder.clone(), self.vectors.clone())
            .with_top_k(config.retrieval.top_k)
            .with_max_distance(config.retrieval.max_distance);
        let llm = Arc::new(LlmClient::new(config.model.clone()));
        let synthesizer = AnswerSynthesizer::new(llm)
            .with_timeout(Duration::from_secs(config.model.timeout_secs));
        let context = ContextWindow::new(
            config.retrieval.query_user_turns,
            config.retrieval.tail_turns,
        );
        RagPipeline::new(retriever, synthesizer, self.sessions.clone()).with_context_window(context)
    }
}

fn build_embedder(config: &YojanaConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider {
        EmbeddingBackend::Local => Ok(Arc::new(LocalEmbedding::new(config.embedding.dimension))),
        #[cfg(feature = "http-embeddings")]
        EmbeddingBackend::Http => {
            if config.embedding.base_url.is_empty() {
                anyhow::bail!("embedding.base_url is required for the http embedding provider");
            }
            Ok(Arc::new(yojana_memory::HttpEmbedding::new(
                config.embedding.base_url.clone(),
                config.embedding.model.clone(),
                config.embedding.api_key.clone(),
                config.embedding.dimension,
            )))
        }
        #[cfg(not(feature = "http-embeddings"))]
        EmbeddingBackend::Http => {
            anyhow::bail!("http embeddings require building with the `http-embeddings` feature")
        }
    }
}

async fn open_sessions(config: &YojanaConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.sessions.backend {
        SessionBackend::File => Ok(Arc::new(
            FileSessionStore::new(config.sessions_dir()).await?,
        )),
        #[cfg(feature = "sqlite")]
        SessionBackend::Sqlite => Ok(Arc::new(yojana_session::SqliteSessionStore::open(
            &config.sqlite_path(),
        )?)),
        #[cfg(not(feature = "sqlite"))]
        SessionBackend::Sqlite => {
            anyhow::bail!("the sqlite session backend requires building with the `sqlite` feature")
        }
    }
}
