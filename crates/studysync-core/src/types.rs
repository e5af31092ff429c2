use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Caller-supplied or synthesized identifier for one chat user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Synthetic id for callers that did not identify themselves.
    /// UUIDv7 keeps ids unique under concurrent requests and sortable in logs.
    pub fn synthetic() -> Self {
        Self(format!("user-{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Memory scope for one conversation: `resource` owns many `thread`s.
///
/// The gateway uses the user id for both halves, so each user has exactly
/// one long-running thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadKey {
    pub resource: String,
    pub thread: String,
}

impl ThreadKey {
    pub fn new(resource: impl Into<String>, thread: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            thread: thread.into(),
        }
    }

    pub fn for_user(user_id: &UserId) -> Self {
        Self::new(user_id.as_str(), user_id.as_str())
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.thread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_ids_are_unique() {
        let a = UserId::synthetic();
        let b = UserId::synthetic();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("user-"));
    }

    #[test]
    fn user_thread_key_reuses_id() {
        let key = ThreadKey::for_user(&UserId::from("u1"));
        assert_eq!(key.resource, "u1");
        assert_eq!(key.thread, "u1");
        assert_eq!(key.to_string(), "u1/u1");
    }
}
