//! Google Gemini provider over the Generative Language API (API key auth).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::provider::{
    http_client, retry_after_ms, transport_error, ChatRequest, ChatResponse, LlmProvider,
    ProviderError, Role,
};

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

/// Build the generateContent request body.
///
/// Gemini requires `contents` to open with a user turn and to alternate
/// roles, so leading model turns are dropped and consecutive turns from the
/// same side are merged.
fn build_body(req: &ChatRequest) -> Value {
    let mut contents: Vec<(&'static str, String)> = Vec::new();
    for m in &req.messages {
        let role = match m.role {
            Role::Assistant => "model",
            Role::User => "user",
            // System text travels in systemInstruction.
            Role::System => continue,
        };
        if contents.is_empty() && role == "model" {
            continue;
        }
        match contents.last_mut() {
            Some((last, text)) if *last == role => {
                text.push_str("\n\n");
                text.push_str(&m.content);
            }
            _ => contents.push((role, m.content.clone())),
        }
    }

    let contents: Vec<Value> = contents
        .into_iter()
        .map(|(role, text)| json!({ "role": role, "parts": [{ "text": text }] }))
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "maxOutputTokens": req.max_tokens,
        }
    });
    if !req.system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": req.system }] });
    }
    body
}

fn parse_response(resp: GeminiResponse, model: &str) -> ChatResponse {
    let candidate = resp.candidates.into_iter().next();
    let content = candidate
        .as_ref()
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let stop_reason = candidate.and_then(|c| c.finish_reason).unwrap_or_default();
    let usage = resp.usage_metadata.unwrap_or_default();

    ChatResponse {
        content,
        model: resp.model_version.unwrap_or_else(|| model.to_string()),
        tokens_in: usage.prompt_token_count,
        tokens_out: usage.candidates_token_count,
        stop_reason,
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_body(req);
        debug!(model = %req.model, turns = req.messages.len(), "sending request to Gemini");

        let resp = self
            .client
            .post(self.endpoint(&req.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after_ms(resp.headers()),
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Gemini API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp, &req.model))
    }
}

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
