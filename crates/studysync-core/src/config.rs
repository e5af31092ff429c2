use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 4111;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_AGENT_NAME: &str = "studySyncAgent";
pub const DEFAULT_CONFIG_FILE: &str = "studysync.toml";
pub const SERVICE_NAME: &str = "StudySync Agent API";

/// Substrings that mark a text part as system or transport noise rather than
/// something the user typed.
pub const DEFAULT_DENYLIST: &[&str] = &["ERROR", "WebSocket", "Analyzing", "Let me"];

/// Top-level config (studysync.toml + STUDYSYNC_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudySyncConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Agent identity and generation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Route segment under `/a2a/agent/`.
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Name the agent introduces itself with.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Upper bound on a single provider round-trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Optional file replacing the built-in persona instructions.
    pub instructions_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            display_name: default_display_name(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_steps: default_max_steps(),
            request_timeout_secs: default_request_timeout_secs(),
            instructions_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_path")]
    pub path: String,
    /// How many prior messages are recalled into each generation.
    #[serde(default = "default_last_messages")]
    pub last_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            last_messages: default_last_messages(),
        }
    }
}

/// Tuning for the message-part text extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// A preferred candidate must be strictly longer than this (in chars).
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            denylist: default_denylist(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub gemini: Option<GeminiConfig>,
    pub openai: Option<OpenAiProviderConfig>,
}

impl ProvidersConfig {
    pub fn is_empty(&self) -> bool {
        self.gemini.is_none() && self.openai.is_none()
    }
}

/// Google Generative Language API (Gemini) with a plain API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}
fn default_display_name() -> String {
    "StudySync".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_steps() -> u32 {
    3
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_memory_path() -> String {
    "./studysync-memory.db".to_string()
}
fn default_last_messages() -> usize {
    25
}
fn default_min_length() -> usize {
    10
}
fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()
}
pub fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
pub fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl StudySyncConfig {
    /// Load config from a TOML file with STUDYSYNC_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ./studysync.toml
    ///
    /// A missing file is not an error; every field has a default.
    /// Nested keys use a double underscore: `STUDYSYNC_GATEWAY__PORT=8080`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);

        let mut config: StudySyncConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("STUDYSYNC_").split("__"))
            .extract()
            .map_err(|e| crate::error::StudySyncError::Config(e.to_string()))?;

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply the conventional deployment variables on top of the file config.
    ///
    /// `PORT` always wins. Provider keys only fill in when no provider is
    /// configured, Gemini first.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => self.gateway.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring unparsable PORT"),
            }
        }

        if !self.providers.is_empty() {
            return;
        }
        if let Some(key) = lookup("GOOGLE_GENERATIVE_AI_API_KEY").filter(|k| !k.is_empty()) {
            self.providers.gemini = Some(GeminiConfig {
                api_key: key,
                base_url: default_gemini_base_url(),
            });
        } else if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.providers.openai = Some(OpenAiProviderConfig {
                api_key: key,
                base_url: default_openai_base_url(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_original_deployment() {
        let cfg = StudySyncConfig::default();
        assert_eq!(cfg.gateway.port, 4111);
        assert_eq!(cfg.agent.name, "studySyncAgent");
        assert_eq!(cfg.agent.max_steps, 3);
        assert_eq!(cfg.memory.last_messages, 25);
        assert_eq!(cfg.extractor.min_length, 10);
        assert_eq!(cfg.extractor.denylist.len(), 4);
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn port_env_overrides_file_value() {
        let mut cfg = StudySyncConfig::default();
        cfg.apply_env(env(&[("PORT", "8080")]));
        assert_eq!(cfg.gateway.port, 8080);
    }

    #[test]
    fn bad_port_is_ignored() {
        let mut cfg = StudySyncConfig::default();
        cfg.apply_env(env(&[("PORT", "not-a-port")]));
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
    }

    #[test]
    fn google_key_enables_gemini() {
        let mut cfg = StudySyncConfig::default();
        cfg.apply_env(env(&[
            ("GOOGLE_GENERATIVE_AI_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "o-key"),
        ]));
        assert_eq!(cfg.providers.gemini.as_ref().map(|g| g.api_key.as_str()), Some("g-key"));
        assert!(cfg.providers.openai.is_none());
    }

    #[test]
    fn env_keys_do_not_replace_configured_provider() {
        let mut cfg = StudySyncConfig::default();
        cfg.providers.openai = Some(OpenAiProviderConfig {
            api_key: "from-file".into(),
            base_url: default_openai_base_url(),
        });
        cfg.apply_env(env(&[("GOOGLE_GENERATIVE_AI_API_KEY", "g-key")]));
        assert!(cfg.providers.gemini.is_none());
    }

    #[test]
    fn load_merges_toml_and_prefixed_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "studysync.toml",
                r#"
                [gateway]
                port = 5000

                [extractor]
                min_length = 3
                denylist = ["DEBUG"]
                "#,
            )?;
            jail.set_env("STUDYSYNC_AGENT__MODEL", "gemini-1.5-pro");
            jail.set_env("PORT", "5001");

            let cfg = StudySyncConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(cfg.gateway.port, 5001);
            assert_eq!(cfg.gateway.bind, DEFAULT_BIND);
            assert_eq!(cfg.extractor.min_length, 3);
            assert_eq!(cfg.extractor.denylist, vec!["DEBUG".to_string()]);
            assert_eq!(cfg.agent.model, "gemini-1.5-pro");
            Ok(())
        });
    }
}
