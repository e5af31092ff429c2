//! Durable conversation memory keyed by `(resource, thread)`.

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::MemoryError;
pub use manager::MemoryStore;
pub use types::{MessageRole, StoredMessage, ThreadInfo};
