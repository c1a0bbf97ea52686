/// Cloud model adapters
///
/// One adapter per remote provider, both speaking the OpenAI-compatible chat
/// completions protocol through `compat::CompatClient`. Gemini takes documents
/// as attachments and repairs truncated output; Groq needs extracted text and
/// falls back to a summary-only result when its output isn't JSON.

pub mod compat;
pub mod gemini;
pub mod groq;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::analysis::AnalysisResult;
use crate::errors::AssistError;
use crate::provider::ProviderSelection;
use crate::types::{ChatMessage, DocumentContent};

/// Incremental answer tokens from a streaming chat call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AssistError>> + Send + 'static>>;

/// Contract every cloud provider satisfies.
///
/// `api_key` arguments override the adapter's configured key. A missing key is
/// a `Configuration` error raised before any request is made.
#[async_trait]
pub trait CloudModel: Send + Sync {
    fn provider(&self) -> ProviderSelection;

    /// Cheap authenticated probe. Any failure, including network errors, is `false`.
    async fn validate_key(&self, key: &str) -> bool;

    async fn analyze_document(
        &self,
        content: &DocumentContent,
        file_name: &str,
        doc_id: &str,
        api_key: Option<&str>,
    ) -> Result<AnalysisResult, AssistError>;

    /// Single system + user prompt, full answer text.
    async fn complete(&self, system: &str, prompt: &str, api_key: Option<&str>) -> Result<String, AssistError>;

    /// Chat with the full history, streamed.
    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        message: &str,
        api_key: Option<&str>,
    ) -> Result<TokenStream, AssistError>;
}

/// Drain a token stream into the complete answer.
pub async fn collect_stream(mut stream: TokenStream) -> Result<String, AssistError> {
    let mut answer = String::new();
    while let Some(token) = stream.next().await {
        answer.push_str(&token?);
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_stream_concatenates() {
        let stream: TokenStream = Box::pin(futures::stream::iter(vec![
            Ok("The claim ".to_string()),
            Ok("is in time.".to_string()),
        ]));
        assert_eq!(collect_stream(stream).await.unwrap(), "The claim is in time.");
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_error() {
        let stream: TokenStream = Box::pin(futures::stream::iter(vec![
            Ok("partial".to_string()),
            Err(AssistError::provider(ProviderSelection::Groq, None, "Stream interrupted")),
        ]));
        assert!(collect_stream(stream).await.is_err());
    }
}
