use serde::Deserialize;
use std::path::{Path, PathBuf};
use yojana_agent::ModelConfig;

#[derive(Debug, Deserialize)]
pub struct YojanaConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Hashed bag-of-words, no network.
    Local,
    /// OpenAI-compatible `/v1/embeddings` server.
    Http,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_backend")]
    pub provider: EmbeddingBackend,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_backend(),
            dimension: default_dimension(),
            base_url: String::new(),
            model: default_embedding_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Results farther than this cosine distance are discarded.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "default_query_user_turns")]
    pub query_user_turns: usize,
    #[serde(default = "default_tail_turns")]
    pub tail_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_distance: default_max_distance(),
            query_user_turns: default_query_user_turns(),
            tail_turns: default_tail_turns(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    File,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_session_backend")]
    pub backend: SessionBackend,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_rps")]
    pub max_requests_per_second: f64,
    #[serde(default = "default_burst")]
    pub max_burst: f64,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: default_rps(),
            max_burst: default_burst(),
            api_keys: vec![],
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Local
}
fn default_dimension() -> usize {
    384
}
fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_top_k() -> usize {
    yojana_agent::retriever::DEFAULT_TOP_K
}
fn default_max_distance() -> f32 {
    yojana_agent::retriever::DEFAULT_MAX_DISTANCE
}
fn default_query_user_turns() -> usize {
    yojana_agent::context::DEFAULT_QUERY_USER_TURNS
}
fn default_tail_turns() -> usize {
    yojana_agent::context::DEFAULT_TAIL_TURNS
}
fn default_corpus_path() -> PathBuf {
    PathBuf::from("schemes.json")
}
fn default_session_backend() -> SessionBackend {
    SessionBackend::File
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}
fn default_rps() -> f64 {
    5.0
}
fn default_burst() -> f64 {
    20.0
}

impl YojanaConfig {
    /// Parse a config file. Relative `data_dir` and corpus paths are
    /// resolved against the file's directory.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let mut config: YojanaConfig = toml::from_str(&raw)?;

        let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
        if config.data_dir.is_relative() {
            config.data_dir = config_dir.join(&config.data_dir);
        }
        if config.corpus.path.is_relative() {
            config.corpus.path = config_dir.join(&config.corpus.path);
        }
        Ok(config)
    }

    /// Fill secrets missing from the file from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_empty() {
            if let Some(key) = self.model.api_key_env().and_then(&lookup) {
                self.model.api_key = key;
            }
        }
        if self.security.api_keys.is_empty() {
            if let Some(keys) = lookup("YOJANA_API_KEY") {
                self.security.api_keys = keys
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup("YOJANA_EMBEDDING_API_KEY");
        }
    }

    pub fn vector_store_path(&self) -> PathBuf {
        self.data_dir.join("index").join("vectors.jsonl")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    #[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("chat_history.db")
    }
}
