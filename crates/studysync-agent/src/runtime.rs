use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use studysync_core::types::ThreadKey;
use studysync_memory::{MemoryError, MemoryStore, MessageRole};
use tracing::{debug, info, instrument};

use crate::prompt::Persona;
use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError, Role};

/// Which conversation a generation reads from and appends to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryScope {
    pub resource: String,
    pub thread: String,
}

impl MemoryScope {
    pub fn new(resource: impl Into<String>, thread: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            thread: thread.into(),
        }
    }

    fn key(&self) -> ThreadKey {
        ThreadKey::new(self.resource.as_str(), self.thread.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub memory: MemoryScope,
    /// Upper bound on reasoning steps. `None` means the runtime default.
    pub max_steps: Option<u32>,
}

/// Result of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("provider returned an empty reply")]
    EmptyReply,
}

/// The contract the HTTP surface talks to.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Generation, AgentError>;
}

/// Memory-backed agent: recalls the thread, asks the provider, records the
/// exchange. Shared across requests via `Arc`.
pub struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    persona: Persona,
    memory: Arc<MemoryStore>,
    model: String,
    max_tokens: u32,
    last_messages: usize,
}

impl AgentRuntime {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        persona: Persona,
        memory: Arc<MemoryStore>,
        model: String,
    ) -> Self {
        Self {
            provider,
            persona,
            memory,
            model,
            max_tokens: 1024,
            last_messages: 25,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// How many stored messages are replayed ahead of the new ones.
    pub fn with_last_messages(mut self, last_messages: usize) -> Self {
        self.last_messages = last_messages;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        key: &ThreadKey,
        messages: &[Message],
    ) -> Result<ChatRequest, AgentError> {
        let system = self.persona.system_prompt(
            messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str()),
        );

        let mut turns: Vec<Message> = self
            .memory
            .history(key, self.last_messages)?
            .into_iter()
            .map(|m| match m.role {
                MessageRole::User => Message::user(m.content),
                MessageRole::Assistant => Message::assistant(m.content),
            })
            .collect();
        let recalled = turns.len();
        turns.extend(messages.iter().filter(|m| m.role != Role::System).cloned());
        debug!(recalled, total = turns.len(), "conversation assembled");

        Ok(ChatRequest {
            model: self.model.clone(),
            system,
            messages: turns,
            max_tokens: self.max_tokens,
        })
    }

    fn remember(
        &self,
        key: &ThreadKey,
        messages: &[Message],
        reply: &str,
    ) -> Result<(), AgentError> {
        for m in messages.iter().filter(|m| m.role == Role::User) {
            self.memory.save_message(key, MessageRole::User, &m.content)?;
        }
        self.memory.save_message(key, MessageRole::Assistant, reply)?;
        Ok(())
    }
}

#[async_trait]
impl Agent for AgentRuntime {
    #[instrument(
        skip_all,
        fields(thread = %options.memory.key(), provider = %self.provider.name())
    )]
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<Generation, AgentError> {
        // No tools are registered, so every accepted budget resolves in one step.
        if options.max_steps == Some(0) {
            return Err(AgentError::InvalidOptions("maxSteps must be at least 1".into()));
        }

        let key = options.memory.key();
        let req = self.build_request(&key, messages)?;

        let started = Instant::now();
        let resp = self.provider.send(&req).await?;
        let reply = resp.content.trim();
        if reply.is_empty() {
            return Err(AgentError::EmptyReply);
        }

        info!(
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            stop_reason = %resp.stop_reason,
            latency_ms = started.elapsed().as_millis() as u64,
            "generation complete"
        );

        self.remember(&key, messages, reply)?;
        Ok(Generation {
            text: reply.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::provider::ChatResponse;

    /// Records every request and answers with a fixed reply.
    struct ScriptedProvider {
        reply: Result<String, u16>,
        seen: Arc<Mutex<Vec<ChatRequest>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().expect("lock").push(req.clone());
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    model: req.model.clone(),
                    tokens_in: 10,
                    tokens_out: 5,
                    stop_reason: "STOP".into(),
                }),
                Err(status) => Err(ProviderError::Api {
                    status: *status,
                    message: "boom".into(),
                }),
            }
        }
    }

    type Seen = Arc<Mutex<Vec<ChatRequest>>>;

    fn runtime(reply: Result<&str, u16>) -> (AgentRuntime, Arc<MemoryStore>, Seen) {
        let memory = Arc::new(MemoryStore::open_in_memory().expect("store"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = ScriptedProvider {
            reply: reply.map(str::to_string),
            seen: Arc::clone(&seen),
        };
        let rt = AgentRuntime::new(
            Box::new(provider),
            Persona::new("You are StudySync."),
            Arc::clone(&memory),
            "gemini-2.0-flash".into(),
        );
        (rt, memory, seen)
    }

    fn options(user: &str) -> GenerateOptions {
        GenerateOptions {
            memory: MemoryScope::new(user, user),
            max_steps: Some(3),
        }
    }

    #[tokio::test]
    async fn generate_recalls_history_and_persists_exchange() {
        let (rt, memory, seen) = runtime(Ok("Let's start with cell biology."));
        let key = ThreadKey::new("u1", "u1");
        memory
            .save_message(&key, MessageRole::User, "I study biology")
            .expect("save");
        memory
            .save_message(&key, MessageRole::Assistant, "Great choice!")
            .expect("save");

        let out = rt
            .generate(
                &[Message::system("Be encouraging."), Message::user("Where do I begin?")],
                &options("u1"),
            )
            .await
            .expect("generate");
        assert_eq!(out.text, "Let's start with cell biology.");

        let reqs = seen.lock().expect("lock");
        let req = &reqs[0];
        assert_eq!(req.system, "You are StudySync.\n\nBe encouraging.");
        let contents: Vec<_> = req.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["I study biology", "Great choice!", "Where do I begin?"]);
        assert!(req.messages.iter().all(|m| m.role != Role::System));

        let stored = memory.history(&key, 10).expect("history");
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2].content, "Where do I begin?");
        assert_eq!(stored[3].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn recall_is_bounded() {
        let (rt, memory, seen) = runtime(Ok("ok"));
        let rt = rt.with_last_messages(2);
        let key = ThreadKey::new("u1", "u1");
        for i in 0..6 {
            memory
                .save_message(&key, MessageRole::User, &format!("old {i}"))
                .expect("save");
        }
        rt.generate(&[Message::user("new")], &options("u1"))
            .await
            .expect("generate");
        let reqs = seen.lock().expect("lock");
        let contents: Vec<_> = reqs[0].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["old 4", "old 5", "new"]);
    }

    #[tokio::test]
    async fn zero_steps_is_rejected_before_provider() {
        let (rt, _memory, seen) = runtime(Ok("unused"));
        let mut opts = options("u1");
        opts.max_steps = Some(0);
        let err = rt
            .generate(&[Message::user("hi there friend")], &opts)
            .await
            .expect_err("rejected");
        assert!(matches!(err, AgentError::InvalidOptions(_)));
        assert!(seen.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn provider_failure_leaves_memory_untouched() {
        let (rt, memory, _seen) = runtime(Err(503));
        let err = rt
            .generate(&[Message::user("Quiz me on algebra")], &options("u2"))
            .await
            .expect_err("provider down");
        assert!(matches!(err, AgentError::Provider(ProviderError::Api { status: 503, .. })));
        assert!(!memory.has_thread(&ThreadKey::new("u2", "u2")).expect("lookup"));
    }

    #[tokio::test]
    async fn blank_reply_is_an_error() {
        let (rt, memory, _seen) = runtime(Ok("   "));
        let err = rt
            .generate(&[Message::user("Explain photosynthesis")], &options("u3"))
            .await
            .expect_err("blank");
        assert!(matches!(err, AgentError::EmptyReply));
        assert!(!memory.has_thread(&ThreadKey::new("u3", "u3")).expect("lookup"));
    }

    #[tokio::test]
    async fn unset_max_steps_is_accepted() {
        let (rt, _memory, _seen) = runtime(Ok("fine"));
        let mut opts = options("u4");
        opts.max_steps = None;
        let out = rt.generate(&[Message::user("hello")], &opts).await.expect("generate");
        assert_eq!(out.text, "fine");
    }
}
