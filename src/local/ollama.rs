/// Ollama-hosted local model
///
/// Loading probes the runtime, then pulls the model. The pull streams NDJSON
/// status lines with byte counts, which become progress events. A model that is
/// already present pulls in one or two lines, so a warm start is quick.
/// Generation calls the /api/chat endpoint with streaming disabled.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{EngineMessage, LocalEngine, ModelLoader};
use crate::config::LocalConfig;
use crate::errors::AssistError;
use crate::provider::ProviderSelection;
use crate::types::{report, Progress, ProgressSink};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// One NDJSON line of /api/pull output
#[derive(Deserialize, Default)]
#[serde(default)]
struct PullStatus {
    status: Option<String>,
    total: Option<u64>,
    completed: Option<u64>,
    error: Option<String>,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [EngineMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Clone, Copy)]
struct OllamaOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Loads a model into a local Ollama runtime.
pub struct OllamaLoader {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: OllamaOptions,
    timeout: Duration,
    pull_timeout: Duration,
}

impl OllamaLoader {
    pub fn new(config: &LocalConfig) -> Self {
        OllamaLoader {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: OllamaOptions {
                temperature: config.temperature,
                num_ctx: config.context_window,
            },
            timeout: Duration::from_secs(config.timeout_secs),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
        }
    }

    async fn probe(&self) -> Result<(), AssistError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AssistError::RuntimeInitialization(format!(
                "Local model runtime not reachable at {}: {}", self.base_url, e
            )))?;

        if !response.status().is_success() {
            return Err(AssistError::RuntimeInitialization(format!(
                "Local model runtime at {} answered {}", self.base_url, response.status()
            )));
        }
        Ok(())
    }

    async fn pull(&self, progress: Option<&ProgressSink>) -> Result<(), AssistError> {
        let url = format!("{}/api/pull", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&PullRequest { model: &self.model, stream: true })
            .timeout(self.pull_timeout)
            .send()
            .await
            .map_err(|e| AssistError::RuntimeInitialization(format!("Model pull request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AssistError::RuntimeInitialization(format!(
                "Model pull failed (status {}): {}", status.as_u16(), body
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AssistError::RuntimeInitialization(format!("Model pull interrupted: {}", e)))?;
            buf.extend_from_slice(&chunk);
            // NDJSON lines can straddle chunk boundaries
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                self.forward(&line, progress)?;
            }
        }
        if !buf.is_empty() {
            self.forward(&buf, progress)?;
        }
        Ok(())
    }

    fn forward(&self, line: &[u8], progress: Option<&ProgressSink>) -> Result<(), AssistError> {
        if let Some(p) = pull_progress(line)? {
            tracing::debug!(model = %self.model, fraction = p.fraction, status = %p.text, "Model pull progress");
            report(progress, p.fraction, p.text);
        }
        Ok(())
    }
}

/// Interpret one pull status line. Blank or unparseable lines are skipped.
fn pull_progress(line: &[u8]) -> Result<Option<Progress>, AssistError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let status: PullStatus = match serde_json::from_str(line) {
        Ok(s) => s,
        Err(_) => return Ok(None),
    };

    if let Some(error) = status.error {
        return Err(AssistError::RuntimeInitialization(format!("Model pull failed: {}", error)));
    }

    let text = status.status.unwrap_or_default();
    let fraction = match (status.completed, status.total) {
        _ if text == "success" => 1.0,
        (Some(done), Some(total)) if total > 0 => done as f32 / total as f32,
        _ => 0.0,
    };
    Ok(Some(Progress::new(fraction, text)))
}

#[async_trait]
impl ModelLoader for OllamaLoader {
    async fn load(&self, progress: Option<&ProgressSink>) -> Result<Arc<dyn LocalEngine>, AssistError> {
        self.probe().await?;
        report(progress, 0.0, format!("Fetching {}", self.model));
        self.pull(progress).await?;

        Ok(Arc::new(OllamaEngine {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            options: self.options,
            timeout: self.timeout,
        }))
    }
}

/// A model resident in the Ollama runtime.
pub struct OllamaEngine {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: OllamaOptions,
    timeout: Duration,
}

#[async_trait]
impl LocalEngine for OllamaEngine {
    async fn complete(&self, messages: &[EngineMessage]) -> Result<String, AssistError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: self.options,
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AssistError::provider(ProviderSelection::WebLlm, None, format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AssistError::provider(ProviderSelection::WebLlm, Some(status), body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AssistError::provider(
                ProviderSelection::WebLlm,
                None,
                format!("Failed to parse Ollama response: {}", e),
            ))?;

        Ok(chat_response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
