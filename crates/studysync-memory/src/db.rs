use rusqlite::{Connection, Result};

/// Initialise memory tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_threads_table(conn)?;
    create_messages_table(conn)?;
    Ok(())
}

/// One row per (resource, thread) that has ever stored a message.
/// Its existence is what "seen before" means.
fn create_threads_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS threads (
            resource_id   TEXT NOT NULL,
            thread_id     TEXT NOT NULL,
            title         TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            PRIMARY KEY (resource_id, thread_id)
        );",
    )
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_id TEXT NOT NULL,
            thread_id   TEXT NOT NULL,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON messages(resource_id, thread_id, id DESC);",
    )
}
