use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A previous holder of the connection panicked.
    #[error("memory store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, MemoryError>;
