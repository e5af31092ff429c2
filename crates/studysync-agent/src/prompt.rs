use std::path::Path;

use tracing::{info, warn};

/// Built-in StudySync instructions, used unless a file overrides them.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are **StudySync**, an AI-powered study accountability buddy.
You are warm, encouraging, and conversational, like a mix of a study partner and a coach.

Your goals:
1. Greet the user by name if known.
2. Introduce yourself as their \"StudySync\" accountability partner.
3. Ask what they'd like to focus on or how they're feeling about studying today.
4. Encourage realistic, positive progress.
5. Use your memory to recall previous topics, goals, or moods.

Personality:
- Kind, conversational and motivating.
- Reflective and curious (\"You mentioned you were revising biology last time, how's that going?\").
- Adaptable: formal if the user is, casual if they are relaxed.";

/// The agent's standing instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    instructions: String,
}

impl Persona {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Load instructions from `path`, or fall back to the built-in persona
    /// when no path is set or the file is unreadable or empty.
    pub fn load(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match read_instructions(Path::new(path)) {
            Some(text) => {
                info!(path, chars = text.len(), "loaded persona instructions");
                Self::new(text)
            }
            None => {
                warn!(path, "instructions file unusable, using built-in persona");
                Self::default()
            }
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Persona followed by any per-call system text, blank-line separated.
    pub fn system_prompt<'a>(&self, extra: impl IntoIterator<Item = &'a str>) -> String {
        let mut out = self.instructions.clone();
        for part in extra {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(part);
        }
        out
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS)
    }
}

fn read_instructions(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to read instructions file");
        })
        .ok()?;
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    Some(content.to_string())
}
