//! Conversation forwarder: turns a normalized request into reply text.
//!
//! Never fails. Empty messages get the welcome, agent failures get the
//! fallback, so the HTTP surface always has something to send back.

use std::sync::Arc;

use studysync_agent::{Agent, GenerateOptions, MemoryScope, Message};
use studysync_protocol::NormalizedRequest;
use tracing::{debug, warn};

/// Per-call system line sent alongside the agent's own persona.
pub const FORWARD_SYSTEM_PROMPT: &str = "You are StudySync, an AI study accountability partner. \
Be encouraging, practical, and focused on study techniques. Help with study planning, \
progress tracking, and motivation. Keep responses conversational but informative.";

/// Which branch produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Welcome,
    Agent,
    Fallback,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Welcome => "welcome",
            Outcome::Agent => "agent",
            Outcome::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarded {
    pub outcome: Outcome,
    pub text: String,
}

pub struct ConversationForwarder {
    agent: Arc<dyn Agent>,
    display_name: String,
    max_steps: u32,
}

impl ConversationForwarder {
    pub fn new(agent: Arc<dyn Agent>, display_name: impl Into<String>, max_steps: u32) -> Self {
        Self {
            agent,
            display_name: display_name.into(),
            max_steps,
        }
    }

    pub async fn forward(&self, req: &NormalizedRequest) -> Forwarded {
        if req.is_first_contact() {
            debug!(user = %req.user_id, "empty message, sending welcome");
            return Forwarded {
                outcome: Outcome::Welcome,
                text: self.welcome_text(req),
            };
        }

        let messages = [
            Message::system(FORWARD_SYSTEM_PROMPT),
            Message::user(req.message_text.as_str()),
        ];
        let options = GenerateOptions {
            memory: MemoryScope::new(req.user_id.as_str(), req.user_id.as_str()),
            max_steps: Some(self.max_steps),
        };

        match self.agent.generate(&messages, &options).await {
            Ok(generation) => Forwarded {
                outcome: Outcome::Agent,
                text: generation.text,
            },
            Err(e) => {
                warn!(user = %req.user_id, error = %e, "agent failed, sending fallback reply");
                Forwarded {
                    outcome: Outcome::Fallback,
                    text: self.fallback_text(),
                }
            }
        }
    }

    pub fn welcome_text(&self, req: &NormalizedRequest) -> String {
        let greeting = if req.has_user_name() {
            format!("👋 Hello {}!", req.user_name)
        } else {
            "👋 Hello!".to_string()
        };
        format!(
            "{greeting} I'm {}, your AI study partner! I help with study planning, motivation, \
             and learning techniques. What would you like to learn today? 📚",
            self.display_name
        )
    }

    pub fn fallback_text(&self) -> String {
        format!(
            "I'd love to help you with your studies! As {}, I specialize in:\n\n\
             • Creating personalized study plans 📅\n\
             • Tracking your learning progress 📊\n\
             • Recommending effective study techniques 💡\n\
             • Keeping you motivated and accountable 🎯\n\n\
             What specific subject or study challenge can I help you with today?",
            self.display_name
        )
    }
}
