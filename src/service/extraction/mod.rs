//! Requirement extraction service using LLM
//!
//! Turns a requirements document (spreadsheet, PDF or image) into a list of
//! requirement rows through one structured-output chat completions call.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::model::extracted::{ExtractedRequirement, ExtractedRequirements};
use crate::model::{RequirementDetail, UploadedDocument};
use crate::service::llm::{ChatCompletions, ChatRequest, ContentPart};
use crate::service::spreadsheet;

pub mod error;
pub mod prompts;

pub use error::ExtractionError;

use prompts::{
    DEFAULT_DOCUMENT_NAME, DEFAULT_SPREADSHEET_NAME, build_extraction_prompt,
    build_spreadsheet_context, requirements_response_format,
};

/// Service for extracting requirement rows from a requirements document
pub struct ExtractionService {
    chat: Arc<dyn ChatCompletions>,
    model: String,
}

impl ExtractionService {
    pub fn new(chat: Arc<dyn ChatCompletions>, model: impl Into<String>) -> Self {
        let model = model.into();
        tracing::info!(model = %model, "Requirement extraction service initialized");
        Self { chat, model }
    }

    /// Extract requirement rows from `document`.
    ///
    /// `limit` restricts the model to the first rows of the document and caps
    /// the flattened spreadsheet text accordingly; zero means no limit.
    pub async fn extract(
        &self,
        document: &UploadedDocument,
        limit: Option<u32>,
    ) -> Result<Vec<RequirementDetail>, ExtractionError> {
        let start_time = Instant::now();
        let limit = limit.filter(|l| *l > 0);
        let request = self.build_request(document, limit)?;

        tracing::debug!(
            document = %document.name,
            mime_type = %document.content_type(),
            limit = ?limit,
            prompt_length = request.text_len(),
            "Initiating requirement extraction"
        );

        let response = self.chat.complete(&request).await?;
        let requirements = parse_requirements(response.content())?;

        tracing::info!(
            document = %document.name,
            requirement_count = requirements.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Requirement extraction completed"
        );

        Ok(requirements)
    }

    fn build_request(
        &self,
        document: &UploadedDocument,
        limit: Option<u32>,
    ) -> Result<ChatRequest, ExtractionError> {
        let mut parts = vec![ContentPart::text(build_extraction_prompt(limit))];

        if document.is_spreadsheet() {
            let flattened =
                spreadsheet::flatten_document(document, limit.map(|l| l as usize))?;
            parts.push(ContentPart::file(
                document,
                DEFAULT_SPREADSHEET_NAME,
                document.data_url(),
            ));
            if !flattened.trim().is_empty() {
                parts.push(ContentPart::text(build_spreadsheet_context(&flattened)));
            } else {
                tracing::warn!(
                    document = %document.name,
                    "Spreadsheet has no data rows, sending the file alone"
                );
            }
        } else {
            parts.push(ContentPart::from_document(document, DEFAULT_DOCUMENT_NAME));
        }

        let mut request = ChatRequest::user(&self.model, parts);
        request.response_format = Some(requirements_response_format());
        Ok(request)
    }
}

/// Parse the message content of an extraction response.
///
/// Absent content, or JSON that is not an object, yields no rows; the caller
/// decides what an empty extraction means.
fn parse_requirements(content: Option<String>) -> Result<Vec<RequirementDetail>, ExtractionError> {
    let Some(content) = content else {
        tracing::warn!("Extraction response carried no message content");
        return Ok(Vec::new());
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| {
        tracing::error!(
            content = %content.chars().take(500).collect::<String>(),
            "Failed to parse JSON from extraction"
        );
        ExtractionError::InvalidPayload(e.to_string())
    })?;

    if !value.is_object() {
        tracing::warn!("Extraction response is not a JSON object, treating as empty");
        return Ok(Vec::new());
    }

    let extracted: ExtractedRequirements = serde_json::from_value(value)
        .map_err(|e| ExtractionError::InvalidPayload(e.to_string()))?;

    Ok(extracted
        .requirements
        .into_iter()
        .map(convert_requirement)
        .collect())
}

fn convert_requirement(extracted: ExtractedRequirement) -> RequirementDetail {
    RequirementDetail {
        id: extracted.id,
        parameter: extracted.parameter,
        requirement: extracted.requirement,
        source: extracted.source,
        notes: extracted.notes,
    }
}
