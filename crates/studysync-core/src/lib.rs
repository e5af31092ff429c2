pub mod config;
pub mod error;
pub mod types;

pub use config::StudySyncConfig;
pub use error::{Result, StudySyncError};
pub use types::{ThreadKey, UserId};
