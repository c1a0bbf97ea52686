/// Gemini adapter (cloud-primary)
///
/// The only backend that ingests scans, photos and PDFs directly: documents
/// without a text kind are attached inline. Output goes through full
/// structured-result recovery, since long analyses often hit the token limit.

use async_trait::async_trait;

use super::compat::{CompatClient, OutMessage};
use super::{CloudModel, TokenStream};
use crate::analysis::{normalize, AnalysisResult, IdStrategy};
use crate::config::CloudConfig;
use crate::errors::AssistError;
use crate::prompts::{build_analysis_prompt, build_attachment_analysis_prompt, ANALYSIS_SYSTEM};
use crate::provider::ProviderSelection;
use crate::recovery::recover;
use crate::types::{ChatMessage, ContentKind, DocumentContent};

pub struct GeminiAdapter {
    client: CompatClient,
}

impl GeminiAdapter {
    pub fn new(config: &CloudConfig) -> Self {
        GeminiAdapter {
            client: CompatClient::new(ProviderSelection::Gemini, config),
        }
    }

    /// Text goes in the prompt; anything else with encoded bytes is attached.
    fn analysis_message(content: &DocumentContent, file_name: &str) -> Result<OutMessage, AssistError> {
        let attach = content.kind != ContentKind::Text || content.plain_text().is_none();
        match (content.plain_text(), content.data.as_deref().filter(|d| !d.is_empty())) {
            (_, Some(data)) if attach => {
                let mime = content.mime_type.as_deref().unwrap_or("application/octet-stream");
                Ok(OutMessage::user_with_attachment(build_attachment_analysis_prompt(file_name), mime, data))
            }
            (Some(text), _) => Ok(OutMessage::user(build_analysis_prompt(file_name, text))),
            (None, _) => Err(AssistError::Configuration(format!(
                "{} has neither extracted text nor file content to analyse",
                file_name
            ))),
        }
    }
}

#[async_trait]
impl CloudModel for GeminiAdapter {
    fn provider(&self) -> ProviderSelection {
        ProviderSelection::Gemini
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
        let user = Self::analysis_message(content, file_name)?;

        tracing::info!(file_name, doc_id, kind = ?content.kind, model = self.client.model(), "Analyzing document");
        let raw = self.client.chat(&key, &[OutMessage::system(ANALYSIS_SYSTEM), user]).await?;

        let value = recover(&raw).ok_or_else(|| {
            tracing::warn!(file_name, response_len = raw.len(), "Gemini response had no recoverable structure");
            AssistError::provider(ProviderSelection::Gemini, None, "Response contained no usable analysis")
        })?;

        Ok(normalize(&value, file_name, IdStrategy::Positional { doc_id }))
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
