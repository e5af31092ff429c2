use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use studysync_agent::gemini::GeminiProvider;
use studysync_agent::openai::OpenAiProvider;
use studysync_agent::prompt::Persona;
use studysync_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use studysync_agent::{Agent, AgentRuntime};
use studysync_core::config::StudySyncConfig;
use studysync_gateway::{build_router, load_dotenv, AppState, ConversationForwarder};
use studysync_memory::MemoryStore;
use tracing::{info, warn};

/// Model used with the OpenAI provider when the configured one is a Gemini id.
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Parser, Debug)]
#[command(name = "studysync-gateway", version, about = "StudySync study-buddy chat gateway")]
struct Args {
    /// Config file (default: $STUDYSYNC_CONFIG, then ./studysync.toml)
    #[arg(long)]
    config: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be read before RUST_LOG and the STUDYSYNC_* overrides are.
    let dotenv = load_dotenv(None);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studysync_gateway=info,tower_http=debug".into()),
        )
        .init();

    match dotenv {
        Ok(Some(path)) => info!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, ".env not loaded, using process environment"),
    }

    let args = Args::parse();

    // config: --config > STUDYSYNC_CONFIG > ./studysync.toml
    let config_path = args.config.or_else(|| std::env::var("STUDYSYNC_CONFIG").ok());
    let mut config = StudySyncConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        let mut config = StudySyncConfig::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }

    ensure_parent_dir(&config.memory.path);
    info!(path = %config.memory.path, "opening memory store");
    let memory = Arc::new(MemoryStore::open(&config.memory.path)?);

    let (provider, model) = build_provider(&config);
    let persona = Persona::load(config.agent.instructions_path.as_deref());
    let runtime = AgentRuntime::new(provider, persona, Arc::clone(&memory), model)
        .with_max_tokens(config.agent.max_tokens)
        .with_last_messages(config.memory.last_messages);
    info!(provider = runtime.provider_name(), model = runtime.model(), "agent ready");

    let agent: Arc<dyn Agent> = Arc::new(runtime);
    let forwarder = ConversationForwarder::new(
        agent,
        config.agent.display_name.clone(),
        config.agent.max_steps,
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let agent_name = config.agent.name.clone();
    let state = Arc::new(AppState::new(config, forwarder, memory));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("StudySync gateway listening on http://{}", addr);
    info!("  health: http://{}/health", addr);
    info!("  A2A:    http://{}/a2a/agent/{}", addr, agent_name);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

/// Pick the LLM provider: Gemini first, then OpenAI, else a provider that
/// always fails so every chat gets the fallback reply.
fn build_provider(config: &StudySyncConfig) -> (Box<dyn LlmProvider>, String) {
    let timeout = Duration::from_secs(config.agent.request_timeout_secs);
    let model = config.agent.model.clone();

    if let Some(ref gemini) = config.providers.gemini {
        info!("LLM provider: Gemini ({})", gemini.base_url);
        let provider =
            GeminiProvider::new(gemini.api_key.clone(), gemini.base_url.clone(), timeout);
        return (Box::new(provider), model);
    }

    if let Some(ref openai) = config.providers.openai {
        info!("LLM provider: OpenAI ({})", openai.base_url);
        let model = if model.starts_with("gemini") {
            warn!(
                configured = %model,
                fallback = DEFAULT_OPENAI_MODEL,
                "Gemini model id with OpenAI provider"
            );
            DEFAULT_OPENAI_MODEL.to_string()
        } else {
            model
        };
        let provider =
            OpenAiProvider::new(openai.api_key.clone(), openai.base_url.clone(), timeout);
        return (Box::new(provider), model);
    }

    warn!(
        "no LLM provider configured, set GOOGLE_GENERATIVE_AI_API_KEY; \
         chats will get the fallback reply"
    );
    (Box::new(NullProvider), model)
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Placeholder provider when no API key is available.
struct NullProvider;

#[async_trait::async_trait]
impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable(
            "no LLM provider configured, set GOOGLE_GENERATIVE_AI_API_KEY \
             or providers.gemini.api_key in studysync.toml"
                .into(),
        ))
    }
}
