/// Shared value types: document content, chat messages, progress reporting.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What kind of payload a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Pdf,
    Binary,
}

/// Content descriptor handed to analysis.
///
/// `value` is extracted plain text; `data` is the base64-encoded original.
/// Cloud adapters receive this unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl DocumentContent {
    pub fn text(value: impl Into<String>) -> Self {
        DocumentContent {
            kind: ContentKind::Text,
            value: Some(value.into()),
            mime_type: Some("text/plain".to_string()),
            data: None,
        }
    }

    /// Binary content with no extracted text. The kind is derived from the mime type.
    pub fn encoded(mime_type: &str, bytes: &[u8]) -> Self {
        let kind = if mime_type.starts_with("image/") {
            ContentKind::Image
        } else if mime_type == "application/pdf" {
            ContentKind::Pdf
        } else {
            ContentKind::Binary
        };
        DocumentContent {
            kind,
            value: None,
            mime_type: Some(mime_type.to_string()),
            data: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }

    /// Extracted text, if any non-blank text is present.
    pub fn plain_text(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn has_encoded_bytes(&self) -> bool {
        self.data.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// A document as held by the document store. Never mutated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: String,
    pub file_name: String,
    pub file_type: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub encoded_bytes: Option<String>,
}

impl DocumentRef {
    pub fn to_content(&self) -> DocumentContent {
        let kind = match self.text_content {
            Some(_) => ContentKind::Text,
            None if self.file_type.starts_with("image/") => ContentKind::Image,
            None if self.file_type == "application/pdf" => ContentKind::Pdf,
            None => ContentKind::Binary,
        };
        DocumentContent {
            kind,
            value: self.text_content.clone(),
            mime_type: Some(self.file_type.clone()),
            data: self.encoded_bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Progress of a local-model initialization or generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Fraction complete, clamped to [0, 1].
    pub fraction: f32,
    pub text: String,
}

impl Progress {
    pub fn new(fraction: f32, text: impl Into<String>) -> Self {
        Progress {
            fraction: if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) },
            text: text.into(),
        }
    }
}

pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

/// Deliver a progress event; a missing sink is a no-op.
pub fn report(sink: Option<&ProgressSink>, fraction: f32, text: impl Into<String>) {
    if let Some(sink) = sink {
        sink(Progress::new(fraction, text));
    }
}

/// Cut `text` to at most `max_chars` characters, on a char boundary.
///
/// Returns the kept slice and whether anything was removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}
