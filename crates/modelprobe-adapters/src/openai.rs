//! Chat Completions protocol (OpenAI and compatible gateways).

use std::time::Duration;

use async_trait::async_trait;
use modelprobe_core::{Completion, ModelAdapter, ModelConfig, ProbeError, Result, TokenUsage};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::http;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Adapter speaking `POST {base}/chat/completions` with bearer auth.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_payload(prompt: &str, config: &ModelConfig) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = config.param_str("system_prompt").filter(|s| !s.trim().is_empty()) {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": prompt }));

    let mut payload = json!({
        "model": config.model_name,
        "messages": messages,
    });
    if let Some(max_tokens) = config.param_u64("max_tokens") {
        payload["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = config.param_f64("temperature") {
        payload["temperature"] = json!(temperature);
    }
    payload
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    #[instrument(skip_all, fields(model = %config.model_name, protocol = "openai"))]
    async fn complete(
        &self,
        prompt: &str,
        config: &ModelConfig,
        timeout: Duration,
    ) -> Result<Completion> {
        let mut request = self
            .client
            .post(http::endpoint(&self.base_url, "/chat/completions"))
            .json(&build_payload(prompt, config));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let (body, latency_ms): (ChatResponse, f64) = http::send_json(request, timeout).await?;
        let choice = body.choices.into_iter().next().ok_or_else(|| {
            ProbeError::AdapterProtocol("response did not include choices".to_string())
        })?;

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            latency_ms: Some(latency_ms),
            token_usage: body.usage.map(|u| TokenUsage {
                prompt: u.prompt_tokens,
                completion: u.completion_tokens,
            }),
            reported_model_id: body.model.filter(|m| !m.is_empty()),
        })
    }
}
