//! The StudySync agent: persona, LLM providers and memory-backed generation.

pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod runtime;

pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role};
pub use runtime::{Agent, AgentError, AgentRuntime, GenerateOptions, Generation, MemoryScope};
