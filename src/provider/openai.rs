// src/provider/openai.rs — OpenAI-compatible Chat Completions provider

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, TokenUsage};
use crate::infra::errors::EvoError;

const PROVIDER_ID: &str = "openai";

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".into())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(request: &ChatRequest) -> serde_json::Value {
        let mut msgs = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            msgs.push(serde_json::json!({ "role": "system", "content": system }));
        }
        for m in &request.messages {
            msgs.push(serde_json::json!({ "role": m.role.as_str(), "content": m.content }));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": msgs,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, EvoError> {
        let body = Self::request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EvoError::Provider {
                provider: PROVIDER_ID.into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(EvoError::RateLimited {
                provider: PROVIDER_ID.into(),
                retry_after_ms,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EvoError::Provider {
                provider: PROVIDER_ID.into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| EvoError::Provider {
            provider: PROVIDER_ID.into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        Ok(parse_completion(&resp))
    }
}

fn parse_completion(resp: &serde_json::Value) -> ChatResponse {
    let choice = &resp["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::StopSequence,
        _ => StopReason::Unknown,
    };

    ChatResponse {
        content,
        usage,
        stop_reason,
    }
}
