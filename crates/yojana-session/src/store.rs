use crate::session::{NewTurn, SessionSummary};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;
use yojana_core::{ConversationTurn, Role, YojanaError, YojanaResult};

/// Durable, ordered log of conversation turns grouped by session.
///
/// `append_turns` writes all given turns contiguously, so a user turn and
/// the assistant turn answering it are never split by a concurrent append
/// to the same session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session. A missing or blank title becomes `New Chat`.
    async fn create_session(&self, title: Option<&str>) -> YojanaResult<SessionSummary>;

    /// Header of one session, if it exists.
    async fn get_session(&self, id: Uuid) -> YojanaResult<Option<SessionSummary>>;

    /// All sessions, newest first.
    async fn list_sessions(&self) -> YojanaResult<Vec<SessionSummary>>;

    /// Replace a session's title.
    async fn rename_session(&self, id: Uuid, title: &str) -> YojanaResult<()>;

    /// Delete a session and all its turns. Unknown ids are a no-op.
    async fn delete_session(&self, id: Uuid) -> YojanaResult<()>;

    /// Append turns in order, returning them with their assigned `seq`.
    async fn append_turns(
        &self,
        id: Uuid,
        turns: &[NewTurn],
    ) -> YojanaResult<Vec<ConversationTurn>>;

    /// Append a single turn.
    async fn append_turn(
        &self,
        id: Uuid,
        role: Role,
        content: &str,
    ) -> YojanaResult<ConversationTurn> {
        let turn = NewTurn {
            role,
            content: content.to_string(),
        };
        self.append_turns(id, std::slice::from_ref(&turn))
            .await?
            .pop()
            .ok_or_else(|| YojanaError::Session("append returned no turn".to_string()))
    }

    /// All turns of a session in `seq` order.
    async fn get_turns(&self, id: Uuid) -> YojanaResult<Vec<ConversationTurn>>;
}

fn stamp(next_seq: &mut u64, turns: &[NewTurn]) -> Vec<ConversationTurn> {
    turns
        .iter()
        .map(|t| {
            *next_seq += 1;
            ConversationTurn {
                seq: *next_seq,
                role: t.role,
                content: t.content.clone(),
                timestamp: Utc::now(),
            }
        })
        .collect()
}

fn newest_first(sessions: &mut [SessionSummary]) {
    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// ---------------------------------------------------------------------------
// InMemorySessionStore
// ---------------------------------------------------------------------------

struct MemorySession {
    summary: SessionSummary,
    turns: Vec<ConversationTurn>,
}

/// Volatile session store, for tests and single-shot CLI use.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, MemorySession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, title: Option<&str>) -> YojanaResult<SessionSummary> {
        let summary = SessionSummary::new(title);
        self.sessions.write().await.insert(
            summary.id,
            MemorySession {
                summary: summary.clone(),
                turns: Vec::new(),
            },
        );
        Ok(summary)
    }

    async fn get_session(&self, id: Uuid) -> YojanaResult<Option<SessionSummary>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.summary.clone()))
    }

    async fn list_sessions(&self) -> YojanaResult<Vec<SessionSummary>> {
        let mut all: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(|s| s.summary.clone())
            .collect();
        newest_first(&mut all);
        Ok(all)
    }

    async fn rename_session(&self, id: Uuid, title: &str) -> YojanaResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(YojanaError::SessionNotFound(id))?;
        session.summary.title = title.to_string();
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> YojanaResult<()> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn append_turns(
        &self,
        id: Uuid,
        turns: &[NewTurn],
    ) -> YojanaResult<Vec<ConversationTurn>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(YojanaError::SessionNotFound(id))?;
        let mut next_seq = session.turns.last().map(|t| t.seq).unwrap_or(0);
        let stamped = stamp(&mut next_seq, turns);
        session.turns.extend(stamped.iter().cloned());
        Ok(stamped)
    }

    async fn get_turns(&self, id: Uuid) -> YojanaResult<Vec<ConversationTurn>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.turns.clone())
            .ok_or(YojanaError::SessionNotFound(id))
    }
}

// ---------------------------------------------------------------------------
// FileSessionStore
// ---------------------------------------------------------------------------

/// File-based session store.
///
/// Each session is a `{id}.json` header plus a `{id}.turns.jsonl` append-only
/// turn log in the store directory.
pub struct FileSessionStore {
    dir: PathBuf,
    /// Guards all writes; caches the last assigned `seq` per session.
    last_seq: Mutex<HashMap<Uuid, u64>>,
}

impl FileSessionStore {
    pub async fn new(dir: PathBuf) -> YojanaResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "File session store opened");
        Ok(Self {
            dir,
            last_seq: Mutex::new(HashMap::new()),
        })
    }

    fn header_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn turns_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.turns.jsonl"))
    }

    async fn read_header(&self, id: Uuid) -> YojanaResult<Option<SessionSummary>> {
        let path = self.header_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let summary = serde_json::from_str(&data)
            .map_err(|e| YojanaError::Session(format!("Failed to parse session {id}: {e}")))?;
        Ok(Some(summary))
    }

    async fn write_header(&self, summary: &SessionSummary) -> YojanaResult<()> {
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(self.header_path(summary.id), json).await?;
        Ok(())
    }

    async fn read_turns(&self, id: Uuid) -> YojanaResult<Vec<ConversationTurn>> {
        let path = self.turns_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let mut turns: Vec<ConversationTurn> = data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        turns.sort_by_key(|t| t.seq);
        Ok(turns)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create_session(&self, title: Option<&str>) -> YojanaResult<SessionSummary> {
        let summary = SessionSummary::new(title);
        let _guard = self.last_seq.lock().await;
        self.write_header(&summary).await?;
        debug!(session_id = %summary.id, "Session created");
        Ok(summary)
    }

    async fn get_session(&self, id: Uuid) -> YojanaResult<Option<SessionSummary>> {
        self.read_header(id).await
    }

    async fn list_sessions(&self) -> YojanaResult<Vec<SessionSummary>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Ok(id) = Uuid::parse_str(stem) {
                if let Some(summary) = self.read_header(id).await? {
                    sessions.push(summary);
                }
            }
        }
        newest_first(&mut sessions);
        Ok(sessions)
    }

    async fn rename_session(&self, id: Uuid, title: &str) -> YojanaResult<()> {
        let _guard = self.last_seq.lock().await;
        let mut summary = self
            .read_header(id)
            .await?
            .ok_or(YojanaError::SessionNotFound(id))?;
        summary.title = title.to_string();
        self.write_header(&summary).await
    }

    async fn delete_session(&self, id: Uuid) -> YojanaResult<()> {
        let mut last_seq = self.last_seq.lock().await;
        for path in [self.turns_path(id), self.header_path(id)] {
            if path.exists() {
                tokio::fs::remove_file(path).await?;
            }
        }
        last_seq.remove(&id);
        debug!(session_id = %id, "Session deleted");
        Ok(())
    }

    async fn append_turns(
        &self,
        id: Uuid,
        turns: &[NewTurn],
    ) -> YojanaResult<Vec<ConversationTurn>> {
        let mut last_seq = self.last_seq.lock().await;
        if !self.header_path(id).exists() {
            return Err(YojanaError::SessionNotFound(id));
        }

        let mut next_seq = match last_seq.get(&id) {
            Some(seq) => *seq,
            None => self.read_turns(id).await?.last().map(|t| t.seq).unwrap_or(0),
        };
        let stamped = stamp(&mut next_seq, turns);

        let mut data = String::new();
        for turn in &stamped {
            data.push_str(&serde_json::to_string(turn)?);
            data.push('\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.turns_path(id))
            .await?;
        file.write_all(data.as_bytes()).await?;
        file.flush().await?;

        last_seq.insert(id, next_seq);
        Ok(stamped)
    }

    async fn get_turns(&self, id: Uuid) -> YojanaResult<Vec<ConversationTurn>> {
        if !self.header_path(id).exists() {
            return Err(YojanaError::SessionNotFound(id));
        }
        self.read_turns(id).await
    }
}
