/// Groq adapter (cloud-secondary)
///
/// Text only: documents must arrive with extracted text. Output parsing is the
/// simple fence-strip-and-parse path; when that fails the raw answer becomes
/// the summary of an otherwise empty result instead of an error.

use async_trait::async_trait;

use super::compat::{CompatClient, OutMessage};
use super::{CloudModel, TokenStream};
use crate::analysis::{normalize, AnalysisResult, IdStrategy};
use crate::config::CloudConfig;
use crate::errors::AssistError;
use crate::prompts::{build_analysis_prompt, ANALYSIS_SYSTEM};
use crate::provider::ProviderSelection;
use crate::recovery::parse_with_fallback;
use crate::types::{ChatMessage, DocumentContent};

pub struct GroqAdapter {
    client: CompatClient,
}

impl GroqAdapter {
    pub fn new(config: &CloudConfig) -> Self {
        GroqAdapter {
            client: CompatClient::new(ProviderSelection::Groq, config),
        }
    }
}

#[async_trait]
impl CloudModel for GroqAdapter {
    fn provider(&self) -> ProviderSelection {
        ProviderSelection::Groq
    }

    async fn validate_key(&self, key: &str) -> bool {
        self.client.validate(key).await
    }

    async fn analyze_document(
        &self,
        content: &DocumentContent,
        file_name: &str,
        doc_id: &str,
        api_key: Option<&str>,
    ) -> Result<AnalysisResult, AssistError> {
        let key = self.client.resolve_key(api_key)?;
        let text = content.plain_text().ok_or_else(|| {
            AssistError::Configuration(format!(
                "Groq requires pre-extracted text and {} has none. Use Gemini for scans, photos and PDFs",
                file_name
            ))
        })?;

        tracing::info!(file_name, doc_id, model = self.client.model(), "Analyzing document");
        let raw = self
            .client
            .chat(
                &key,
                &[OutMessage::system(ANALYSIS_SYSTEM), OutMessage::user(build_analysis_prompt(file_name, text))],
            )
            .await?;

        match parse_with_fallback(&raw) {
            Some(value) => Ok(normalize(&value, file_name, IdStrategy::Positional { doc_id })),
            None => {
                tracing::warn!(file_name, response_len = raw.len(), "Groq response was not JSON, returning summary-only result");
                Ok(AnalysisResult::fallback(&raw))
            }
        }
    }

    async fn complete(&self, system: &str, prompt: &str, api_key: Option<&str>) -> Result<String, AssistError> {
        let key = self.client.resolve_key(api_key)?;
        self.client
            .chat(&key, &[OutMessage::system(system), OutMessage::user(prompt)])
            .await
    }

    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
        api_key: Option<&str>,
    ) -> Result<TokenStream, AssistError> {
        let key = self.client.resolve_key(api_key)?;
        let messages = OutMessage::conversation(system, history, message);
        self.client.chat_stream(&key, &messages).await
    }
}
