/// OpenAI-compatible chat completions client
///
/// POST {base_url}/chat/completions with bearer auth and
/// `{model, messages, temperature, max_tokens}`; the answer is
/// `choices[0].message.content`. Streaming uses the same endpoint with
/// `stream: true` and server-sent `data:` lines. Every request carries an
/// explicit timeout.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::TokenStream;
use crate::config::CloudConfig;
use crate::errors::AssistError;
use crate::provider::ProviderSelection;
use crate::types::ChatMessage;

// --- HTTP request/response structs ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [OutMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// One outbound message. Content is plain text or multimodal parts.
#[derive(Debug, Clone, Serialize)]
pub struct OutMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl OutMessage {
    pub fn system(text: impl Into<String>) -> Self {
        OutMessage {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        OutMessage {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying an inline attachment as a data URL.
    pub fn user_with_attachment(text: impl Into<String>, mime_type: &str, base64_data: &str) -> Self {
        OutMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", mime_type, base64_data),
                    },
                },
            ]),
        }
    }

    /// System prompt, prior turns, then the new user message.
    pub fn conversation(system: &str, history: &[ChatMessage], message: &str) -> Vec<OutMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OutMessage::system(system));
        messages.extend(history.iter().map(|m| OutMessage {
            role: m.role.as_str().to_string(),
            content: MessageContent::Text(m.content.clone()),
        }));
        messages.push(OutMessage::user(message));
        messages
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

// --- Client ---

pub struct CompatClient {
    client: reqwest::Client,
    provider: ProviderSelection,
    base_url: String,
    model: String,
    configured_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl CompatClient {
    pub fn new(provider: ProviderSelection, config: &CloudConfig) -> Self {
        CompatClient {
            client: reqwest::Client::new(),
            provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            configured_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn provider(&self) -> ProviderSelection {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Per-call key first, then the configured key.
    pub fn resolve_key(&self, per_call: Option<&str>) -> Result<String, AssistError> {
        per_call
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| self.configured_key.clone())
            .ok_or_else(|| AssistError::Configuration(format!(
                "{} API key is required. Add one in settings or set TRIBUNAL_{}__API_KEY",
                self.provider,
                self.provider.as_str().to_ascii_uppercase()
            )))
    }

    /// GET {base_url}/models. True only for a 2xx answer.
    pub async fn validate(&self, key: &str) -> bool {
        if key.trim().is_empty() {
            return false;
        }
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(key.trim())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => {
                let ok = response.status().is_success();
                tracing::debug!(provider = %self.provider, status = response.status().as_u16(), "API key probe");
                ok
            }
            Err(e) => {
                tracing::debug!(provider = %self.provider, error = %e, "API key probe failed");
                false
            }
        }
    }

    async fn post(&self, key: &str, messages: &[OutMessage], stream: bool) -> Result<reqwest::Response, AssistError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: stream.then_some(true),
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("Request timed out after {}s", self.timeout.as_secs())
                } else {
                    format!("HTTP request failed: {}", e)
                };
                AssistError::provider(self.provider, None, message)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.provider, status = status.as_u16(), "Provider returned an error");
            return Err(AssistError::provider(
                self.provider,
                Some(status.as_u16()),
                error_message(&body).unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                }),
            ));
        }

        Ok(response)
    }

    /// Full answer text.
    pub async fn chat(&self, key: &str, messages: &[OutMessage]) -> Result<String, AssistError> {
        let response = self.post(key, messages, false).await?;

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AssistError::provider(self.provider, None, format!("Failed to parse response: {}", e))
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AssistError::provider(self.provider, None, "Response contained no choices"))?;

        tracing::debug!(provider = %self.provider, model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }

    /// Streamed answer tokens.
    pub async fn chat_stream(&self, key: &str, messages: &[OutMessage]) -> Result<TokenStream, AssistError> {
        let response = self.post(key, messages, true).await?;
        let provider = self.provider;

        let stream = response
            .bytes_stream()
            .scan(Vec::<u8>::new(), move |buf, chunk| {
                let items = match chunk {
                    Ok(bytes) => {
                        buf.extend_from_slice(&bytes);
                        drain_sse_tokens(buf)
                    }
                    Err(e) => vec![Err(AssistError::provider(provider, None, format!("Stream interrupted: {}", e)))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

/// Pull complete SSE lines out of `buf` and return their tokens.
/// A partial trailing line stays in `buf` for the next chunk.
fn drain_sse_tokens(buf: &mut Vec<u8>) -> Vec<Result<String, AssistError>> {
    let mut tokens = Vec::new();
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            continue;
        }
        if let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) {
            if let Some(content) = chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
                if !content.is_empty() {
                    tokens.push(Ok(content));
                }
            }
        }
    }
    tokens
}

/// Provider-supplied error text from an error body, if it has one.
///
/// Handles `{"error": {"message": ...}}`, `{"error": "..."}`, and the same
/// wrapped in a one-element array.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let value = match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    let message = match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        err => err.get("message").and_then(Value::as_str).map(str::to_string),
    };
    message.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#).as_deref(),
            Some("Invalid API Key")
        );
        assert_eq!(
            error_message(r#"[{"error":{"code":400,"message":"API key not valid"}}]"#).as_deref(),
            Some("API key not valid")
        );
        assert_eq!(error_message(r#"{"error":"quota"}"#).as_deref(), Some("quota"));
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[test]
    fn test_sse_lines_split_across_chunks() {
        let mut buf = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel".to_vec();
        assert!(drain_sse_tokens(&mut buf).is_empty());

        buf.extend_from_slice(b"lo\"}}]}\n\ndata: {\"choices\":[{\"delta\":{}}]}\ndata: [DONE]\n");
        let tokens: Vec<String> = drain_sse_tokens(&mut buf).into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(tokens, vec!["Hello".to_string()]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_attachment_serializes_as_data_url_part() {
        let msg = OutMessage::user_with_attachment("read this", "image/png", "aGk=");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_resolve_key_order() {
        let mut config = CloudConfig::groq();
        config.api_key = Some("configured".into());
        let client = CompatClient::new(ProviderSelection::Groq, &config);
        assert_eq!(client.resolve_key(Some("per-call")).unwrap(), "per-call");
        assert_eq!(client.resolve_key(Some("  ")).unwrap(), "configured");
        assert_eq!(client.resolve_key(None).unwrap(), "configured");

        let bare = CompatClient::new(ProviderSelection::Groq, &CloudConfig::groq());
        assert!(matches!(bare.resolve_key(None), Err(AssistError::Configuration(_))));
    }
}
