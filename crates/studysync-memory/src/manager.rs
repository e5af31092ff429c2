use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use studysync_core::types::ThreadKey;
use tracing::{debug, instrument};

use crate::error::{MemoryError, Result};
use crate::types::{MessageRole, StoredMessage, ThreadInfo};

/// Thread titles are cut to this many characters.
const MAX_TITLE_CHARS: usize = 80;

/// Per-thread conversation history on SQLite.
///
/// Thread-safe: wraps the connection in a Mutex that is held for one
/// statement batch at a time, never across an await point.
pub struct MemoryStore {
    db: Mutex<Connection>,
}

impl MemoryStore {
    /// Wrap an already-open connection, creating tables if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    /// Process-lifetime store, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Append a message to the thread, creating the thread on first write.
    #[instrument(skip_all, fields(thread = %key, role = %role))]
    pub fn save_message(&self, key: &ThreadKey, role: MessageRole, content: &str) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let title = match role {
            MessageRole::User => Some(content.chars().take(MAX_TITLE_CHARS).collect::<String>()),
            MessageRole::Assistant => None,
        };

        let mut db = self.lock()?;
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO messages (resource_id, thread_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![key.resource, key.thread, role.to_string(), content, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO threads
                (resource_id, thread_id, title, message_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)
             ON CONFLICT(resource_id, thread_id) DO UPDATE SET
                message_count = message_count + 1,
                title         = COALESCE(threads.title, excluded.title),
                updated_at    = excluded.updated_at",
            rusqlite::params![key.resource, key.thread, title, now],
        )?;
        tx.commit()?;

        debug!(id, "message stored");
        Ok(id)
    }

    /// The most recent `limit` messages of a thread, oldest first.
    #[instrument(skip_all, fields(thread = %key, limit = limit as u64))]
    pub fn history(&self, key: &ThreadKey, limit: usize) -> Result<Vec<StoredMessage>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(
            "SELECT id, resource_id, thread_id, role, content, created_at
             FROM messages
             WHERE resource_id = ?1 AND thread_id = ?2
             ORDER BY id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![key.resource, key.thread, limit as i64],
            row_to_message,
        )?;
        // Reverse so oldest first
        let mut msgs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        msgs.reverse();
        Ok(msgs)
    }

    /// Whether anything has ever been stored for this thread.
    pub fn has_thread(&self, key: &ThreadKey) -> Result<bool> {
        Ok(self.thread(key)?.is_some())
    }

    pub fn thread(&self, key: &ThreadKey) -> Result<Option<ThreadInfo>> {
        let db = self.lock()?;
        let info = db
            .query_row(
                "SELECT resource_id, thread_id, title, message_count, created_at, updated_at
                 FROM threads WHERE resource_id = ?1 AND thread_id = ?2",
                rusqlite::params![key.resource, key.thread],
                |row| {
                    Ok(ThreadInfo {
                        resource_id: row.get(0)?,
                        thread_id: row.get(1)?,
                        title: row.get(2)?,
                        message_count: row.get::<_, i64>(3)? as u32,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| MemoryError::LockPoisoned)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(3)?;
    Ok(StoredMessage {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        thread_id: row.get(2)?,
        role: role.parse().unwrap_or(MessageRole::User),
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &str) -> ThreadKey {
        ThreadKey::new(user, user)
    }

    #[test]
    fn history_is_oldest_first_and_limited() {
        let store = MemoryStore::open_in_memory().expect("store");
        let k = key("u1");
        for i in 0..5 {
            store
                .save_message(&k, MessageRole::User, &format!("question {i}"))
                .expect("save");
            store
                .save_message(&k, MessageRole::Assistant, &format!("answer {i}"))
                .expect("save");
        }

        let recent = store.history(&k, 3).expect("history");
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["answer 3", "question 4", "answer 4"]);
        assert_eq!(recent[1].role, MessageRole::User);
    }

    #[test]
    fn threads_are_scoped() {
        let store = MemoryStore::open_in_memory().expect("store");
        store
            .save_message(&key("alice"), MessageRole::User, "biology")
            .expect("save");
        store
            .save_message(&ThreadKey::new("alice", "side"), MessageRole::User, "chemistry")
            .expect("save");

        let main = store.history(&key("alice"), 10).expect("history");
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].content, "biology");
        assert!(store.history(&key("bob"), 10).expect("history").is_empty());
    }

    #[test]
    fn has_thread_flips_after_first_save() {
        let store = MemoryStore::open_in_memory().expect("store");
        let k = key("u1");
        assert!(!store.has_thread(&k).expect("lookup"));
        store
            .save_message(&k, MessageRole::Assistant, "Hello!")
            .expect("save");
        assert!(store.has_thread(&k).expect("lookup"));
    }

    #[test]
    fn thread_title_comes_from_first_user_message() {
        let store = MemoryStore::open_in_memory().expect("store");
        let k = key("u1");
        store
            .save_message(&k, MessageRole::Assistant, "Welcome")
            .expect("save");
        assert!(store.thread(&k).expect("thread").expect("row").title.is_none());

        let long = "x".repeat(200);
        store.save_message(&k, MessageRole::User, &long).expect("save");
        store
            .save_message(&k, MessageRole::User, "second question")
            .expect("save");

        let info = store.thread(&k).expect("thread").expect("row");
        assert_eq!(info.message_count, 3);
        assert_eq!(info.title.as_deref().map(str::len), Some(MAX_TITLE_CHARS));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memory.db");
        {
            let store = MemoryStore::open(&path).expect("store");
            store
                .save_message(&key("u1"), MessageRole::User, "remember me")
                .expect("save");
        }
        let store = MemoryStore::open(&path).expect("reopen");
        assert!(store.has_thread(&key("u1")).expect("lookup"));
        assert_eq!(store.history(&key("u1"), 5).expect("history")[0].content, "remember me");
    }
}
