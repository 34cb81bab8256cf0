//! Shared LLM client and interaction utilities
//!
//! Speaks the OpenAI-compatible chat completions protocol over `reqwest` and
//! classifies remote failures. Services depend on the [`ChatCompletions`]
//! trait so the transport can be replaced in tests.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::model::{DocumentKind, LlmConfig, UploadedDocument};

/// Error signature the provider reports for documents it refuses to process
const PROVIDER_ERROR_CODE: i64 = 400;
const PROVIDER_ERROR_MESSAGE: &str = "Provider returned error";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    #[error("API_KEY environment variable not set")]
    NotConfigured,

    #[error("Invalid LLM endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("API error: {message}")]
    Api { status: u16, message: String },

    #[error(
        "Document processing failed (400). Please try another file: the document may be damaged, \
         too complex, or blocked by the AI provider's content filter."
    )]
    ProviderRejected,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Chat completions request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

impl ChatRequest {
    /// Single user message request
    pub fn user(model: &str, content: Vec<ContentPart>) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            response_format: None,
            tool_choice: None,
            tools: None,
        }
    }

    /// Total length of the text parts, for logging
    pub fn text_len(&self) -> usize {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .map(|part| match part {
                ContentPart::Text { text } => text.len(),
                _ => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { file: FileData },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileData {
    pub filename: String,
    pub file_data: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Image part for `image/*` documents, file part for everything else
    pub fn from_document(document: &UploadedDocument, fallback_name: &str) -> Self {
        let data_url = document.data_url();
        match document.kind() {
            DocumentKind::Image => ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            },
            _ => ContentPart::file(document, fallback_name, data_url),
        }
    }

    pub fn file(document: &UploadedDocument, fallback_name: &str, data_url: String) -> Self {
        let filename = if document.name.trim().is_empty() {
            fallback_name.to_string()
        } else {
            document.name.clone()
        };
        ContentPart::File {
            file: FileData {
                filename,
                file_data: data_url,
            },
        }
    }
}

/// Successful chat completions response body.
///
/// Kept as raw JSON: providers vary in how they shape `content` and tool
/// call arguments, so accessors normalise on read.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    body: Value,
}

impl ChatResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    fn message(&self) -> Option<&Value> {
        self.body.pointer("/choices/0/message")
    }

    /// Message content as text; structured content is re-serialized
    pub fn content(&self) -> Option<String> {
        match self.message()?.get("content")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Arguments of the first tool call, as JSON text
    pub fn tool_arguments(&self) -> Option<String> {
        match self.message()?.pointer("/tool_calls/0/function/arguments")? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Classify a response into success or a remote error.
///
/// A response is an error when the status is not 2xx or when the body has an
/// `error` member, whatever the status.
pub fn classify_response(status: u16, reason: &str, body: &str) -> Result<ChatResponse, LlmError> {
    let success = (200..300).contains(&status);
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let Some(value) = parsed else {
        if success {
            return Err(LlmError::MalformedResponse(
                "response body is not valid JSON".to_string(),
            ));
        }
        return Err(LlmError::Api {
            status,
            message: reason.to_string(),
        });
    };

    let error = value.get("error").filter(|e| !e.is_null());
    if success && error.is_none() {
        return Ok(ChatResponse::new(value));
    }

    let code = error.and_then(|e| e.get("code")).and_then(lenient_code);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if code == Some(PROVIDER_ERROR_CODE) && message.as_deref() == Some(PROVIDER_ERROR_MESSAGE) {
        return Err(LlmError::ProviderRejected);
    }

    Err(LlmError::Api {
        status,
        message: message.unwrap_or_else(|| reason.to_string()),
    })
}

fn lenient_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Transport seam for chat completions
#[async_trait]
pub trait ChatCompletions: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LlmClient {
    /// Create a client for the configured endpoint.
    ///
    /// A missing API key is accepted here and reported on each call.
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self, LlmError> {
        let endpoint: Url = config
            .completions_url()
            .map_err(|e| LlmError::InvalidEndpoint(format!("{}: {}", config.base_url, e)))?;

        if api_key.is_none() {
            tracing::warn!("API key not found (API_KEY), model calls will fail until it is set");
        }

        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ChatCompletions for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::NotConfigured)?;
        let start_time = Instant::now();

        tracing::debug!(
            model = %request.model,
            endpoint = %self.endpoint,
            prompt_length = request.text_len(),
            "Sending chat completions request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("Unknown status").to_string();
        let body = response.text().await?;
        let elapsed = start_time.elapsed();

        match classify_response(status.as_u16(), &reason, &body) {
            Ok(parsed) => {
                tracing::info!(
                    model = %request.model,
                    elapsed_ms = elapsed.as_millis(),
                    "Chat completions call completed"
                );
                Ok(parsed)
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    status = status.as_u16(),
                    elapsed_ms = elapsed.as_millis(),
                    error = %e,
                    body = %body.chars().take(2000).collect::<String>(),
                    "Chat completions call failed"
                );
                Err(e)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_parts_serialize_with_type_tag() {
        let parts = vec![
            ContentPart::text("hi"),
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AA==".to_string(),
                },
            },
            ContentPart::File {
                file: FileData {
                    filename: "a.pdf".to_string(),
                    file_data: "data:application/pdf;base64,AA==".to_string(),
                },
            },
        ];
        let value = serde_json::to_value(&parts).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "text", "text": "hi"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AA=="}},
                {"type": "file", "file": {"filename": "a.pdf", "file_data": "data:application/pdf;base64,AA=="}}
            ])
        );
    }

    #[test]
    fn test_request_omits_unset_sections() {
        let request = ChatRequest::user("m", vec![ContentPart::text("x")]);
        let text = serde_json::to_string(&request).unwrap();
        assert_eq!(
            text,
            r#"{"model":"m","messages":[{"role":"user","content":[{"type":"text","text":"x"}]}]}"#
        );
    }

    #[test]
    fn test_document_part_selection() {
        let image = UploadedDocument::new("scan.jpg", None, b"x".to_vec());
        assert!(matches!(
            ContentPart::from_document(&image, "document"),
            ContentPart::ImageUrl { .. }
        ));

        let unnamed = UploadedDocument::new("", Some("application/pdf"), b"x".to_vec());
        match ContentPart::from_document(&unnamed, "document") {
            ContentPart::File { file } => assert_eq!(file.filename, "document"),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn test_provider_error_gets_friendly_variant() {
        let body = r#"{"error":{"code":400,"message":"Provider returned error"}}"#;
        assert!(matches!(
            classify_response(400, "Bad Request", body),
            Err(LlmError::ProviderRejected)
        ));
    }

    #[test]
    fn test_error_field_fails_even_with_success_status() {
        let body = r#"{"error":{"code":429,"message":"Rate limit exceeded"}}"#;
        match classify_response(200, "OK", body) {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "Rate limit exceeded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_non_json_error_uses_status_reason() {
        match classify_response(502, "Bad Gateway", "<html>oops</html>") {
            Err(LlmError::Api { message, .. }) => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify_response(200, "OK", "not json"),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_content_and_tool_arguments_accessors() {
        let text = ChatResponse::new(json!({"choices":[{"message":{"content":"{\"a\":1}"}}]}));
        assert_eq!(text.content().as_deref(), Some("{\"a\":1}"));

        let structured = ChatResponse::new(json!({"choices":[{"message":{"content":{"a":1}}}]}));
        assert_eq!(structured.content().as_deref(), Some("{\"a\":1}"));

        let tool = ChatResponse::new(json!({"choices":[{"message":{
            "tool_calls":[{"function":{"name":"f","arguments":{"x":[]}}}]
        }}]}));
        assert_eq!(tool.tool_arguments().as_deref(), Some("{\"x\":[]}"));
        assert_eq!(tool.content(), None);

        let empty = ChatResponse::new(json!({"choices":[]}));
        assert_eq!(empty.tool_arguments(), None);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_sending() {
        let client = LlmClient::new(&LlmConfig::default(), None).unwrap();
        assert!(!client.is_configured());
        let request = ChatRequest::user("m", vec![ContentPart::text("x")]);
        assert!(matches!(
            client.complete(&request).await,
            Err(LlmError::NotConfigured)
        ));
    }
}
