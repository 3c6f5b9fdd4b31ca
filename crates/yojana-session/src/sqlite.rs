use crate::session::{NewTurn, SessionSummary};
use crate::store::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;
use yojana_core::{ConversationTurn, Role, YojanaError, YojanaResult};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT 'New Chat',
        created_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions (id) ON DELETE CASCADE,
        seq INTEGER NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        UNIQUE (session_id, seq)
    );
";

/// SQLite-backed session store.
///
/// The connection is synchronous; every operation runs on the blocking
/// pool while holding the connection mutex.
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

fn db_err(e: rusqlite::Error) -> YojanaError {
    YojanaError::Session(format!("SQLite error: {e}"))
}

fn micros_to_time(micros: i64) -> YojanaResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| YojanaError::Session(format!("invalid timestamp {micros}")))
}

fn parse_id(raw: &str) -> YojanaResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| YojanaError::Session(format!("invalid session id: {e}")))
}

impl SqliteSessionStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> YojanaResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> YojanaResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> YojanaResult<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> YojanaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> YojanaResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| YojanaError::Session(format!("SQLite task failed: {e}")))?
    }
}

fn session_exists(conn: &Connection, id: Uuid) -> YojanaResult<bool> {
    conn.query_row(
        "SELECT 1 FROM sessions WHERE id = ?1",
        params![id.to_string()],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(db_err)
}

fn row_to_summary(id: String, title: String, created_at: i64) -> YojanaResult<SessionSummary> {
    Ok(SessionSummary {
        id: parse_id(&id)?,
        title,
        created_at: micros_to_time(created_at)?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, title: Option<&str>) -> YojanaResult<SessionSummary> {
        let summary = SessionSummary::new(title);
        let row = summary.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![row.id.to_string(), row.title, row.created_at.timestamp_micros()],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await?;
        Ok(summary)
    }

    async fn get_session(&self, id: Uuid) -> YojanaResult<Option<SessionSummary>> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, created_at FROM sessions WHERE id = ?1",
                    params![id.to_string()],
                    |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?)),
                )
                .optional()
                .map_err(db_err)?;
            row.map(|(id, title, created)| row_to_summary(id, title, created))
                .transpose()
        })
        .await
    }

    async fn list_sessions(&self) -> YojanaResult<Vec<SessionSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, title, created_at FROM sessions ORDER BY created_at DESC, id")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
                })
                .map_err(db_err)?;
            let mut sessions = Vec::new();
            for row in rows {
                let (id, title, created) = row.map_err(db_err)?;
                sessions.push(row_to_summary(id, title, created)?);
            }
            Ok(sessions)
        })
        .await
    }

    async fn rename_session(&self, id: Uuid, title: &str) -> YojanaResult<()> {
        let title = title.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET title = ?1 WHERE id = ?2",
                    params![title, id.to_string()],
                )
                .map_err(db_err)?;
            if changed == 0 {
                return Err(YojanaError::SessionNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_session(&self, id: Uuid) -> YojanaResult<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])
                .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn append_turns(
        &self,
        id: Uuid,
        turns: &[NewTurn],
    ) -> YojanaResult<Vec<ConversationTurn>> {
        let turns = turns.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(db_err)?;
            if !session_exists(&tx, id)? {
                return Err(YojanaError::SessionNotFound(id));
            }
            let last: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq), 0) FROM messages WHERE session_id = ?1",
                    params![id.to_string()],
                    |r| r.get(0),
                )
                .map_err(db_err)?;

            let mut seq = last as u64;
            let mut stamped = Vec::with_capacity(turns.len());
            for turn in turns {
                seq += 1;
                let stored = ConversationTurn {
                    seq,
                    role: turn.role,
                    content: turn.content,
                    timestamp: Utc::now(),
                };
                tx.execute(
                    "INSERT INTO messages (session_id, seq, role, content, timestamp) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id.to_string(),
                        stored.seq as i64,
                        stored.role.as_str(),
                        stored.content,
                        stored.timestamp.timestamp_micros()
                    ],
                )
                .map_err(db_err)?;
                stamped.push(stored);
            }
            tx.commit().map_err(db_err)?;
            Ok(stamped)
        })
        .await
    }

    async fn get_turns(&self, id: Uuid) -> YojanaResult<Vec<ConversationTurn>> {
        self.with_conn(move |conn| {
            if !session_exists(conn, id)? {
                return Err(YojanaError::SessionNotFound(id));
            }
            let mut stmt = conn
                .prepare(
                    "SELECT seq, role, content, timestamp FROM messages \
                     WHERE session_id = ?1 ORDER BY seq ASC",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![id.to_string()], |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, i64>(3)?,
                    ))
                })
                .map_err(db_err)?;
            let mut turns = Vec::new();
            for row in rows {
                let (seq, role, content, timestamp) = row.map_err(db_err)?;
                turns.push(ConversationTurn {
                    seq: seq as u64,
                    role: role.parse::<Role>()?,
                    content,
                    timestamp: micros_to_time(timestamp)?,
                });
            }
            Ok(turns)
        })
        .await
    }
}
