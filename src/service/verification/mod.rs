//! Compliance verification service using LLM
//!
//! Sends every supplier document together with the requirement rows in one
//! forced tool call and reshapes the returned rows into compliance results.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::model::extracted::ExtractedVerification;
use crate::model::{ComplianceResult, RequirementDetail, UploadedDocument};
use crate::service::llm::{ChatCompletions, ChatRequest, ContentPart};

pub mod conditions;
pub mod converters;
pub mod error;
pub mod prompts;
pub mod validation;

pub use conditions::{inject_condition_targets, split_condition_rows};
pub use error::VerificationError;

use converters::convert_result;
use prompts::{
    DEFAULT_DOCUMENT_NAME, build_requirements_message, build_verification_prompt,
    document_label, verification_tool, verification_tool_choice,
};
use validation::validate_coverage;

/// Outcome of a verification call
#[derive(Debug, Default)]
pub struct VerifiedResults {
    /// Rows answering the user's requirements
    pub primary: Vec<ComplianceResult>,
    /// Rows answering the injected condition targets
    pub conditions: Vec<ComplianceResult>,
    /// Data-quality findings about the returned rows
    pub warnings: Vec<String>,
}

impl VerifiedResults {
    pub fn len(&self) -> usize {
        self.primary.len() + self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Service for verifying supplier offers against requirement rows
pub struct VerificationService {
    chat: Arc<dyn ChatCompletions>,
    model: String,
}

impl VerificationService {
    pub fn new(chat: Arc<dyn ChatCompletions>, model: impl Into<String>) -> Self {
        let model = model.into();
        tracing::info!(model = %model, "Compliance verification service initialized");
        Self { chat, model }
    }

    /// Verify `requirements` against every supplier document.
    ///
    /// Condition topics missing from the requirements are added before the
    /// call and returned separately in [`VerifiedResults::conditions`].
    pub async fn verify(
        &self,
        documents: &[UploadedDocument],
        requirements: &[RequirementDetail],
    ) -> Result<VerifiedResults, VerificationError> {
        if documents.is_empty() {
            return Err(VerificationError::NoDocuments);
        }
        let start_time = Instant::now();

        let extended = inject_condition_targets(requirements);
        let injected = &extended[requirements.len()..];
        if !injected.is_empty() {
            tracing::debug!(
                injected = injected.len(),
                "Added condition targets missing from the requirements"
            );
        }

        let mut parts = vec![ContentPart::text(build_verification_prompt(documents))];
        parts.extend(prepare_document_parts(documents).await?);
        parts.push(ContentPart::text(
            build_requirements_message(&extended)
                .map_err(|e| VerificationError::Internal(e.to_string()))?,
        ));

        let mut request = ChatRequest::user(&self.model, parts);
        request.tools = Some(vec![verification_tool()]);
        request.tool_choice = Some(verification_tool_choice());

        tracing::debug!(
            model = %self.model,
            document_count = documents.len(),
            requirement_count = extended.len(),
            prompt_length = request.text_len(),
            "Initiating compliance verification"
        );

        let response = self.chat.complete(&request).await?;
        let Some(arguments) = response.tool_arguments() else {
            tracing::error!("Verification response did not contain a tool call");
            return Err(VerificationError::MissingToolCall);
        };

        let rows = parse_results(&arguments)?;
        let split = split_condition_rows(rows, injected);

        let document_names: Vec<String> = documents
            .iter()
            .enumerate()
            .map(|(index, document)| document_label(document, index))
            .collect();
        let mut warnings = split.warnings;
        let coverage = validate_coverage(&split.primary, &document_names);
        let condition_coverage = validate_coverage(&split.conditions, &document_names);
        for warning in coverage.warnings.iter().chain(condition_coverage.warnings.iter()) {
            tracing::warn!(warning = %warning, "Verification coverage issue");
        }
        warnings.extend(coverage.warnings);
        warnings.extend(condition_coverage.warnings);

        tracing::info!(
            model = %self.model,
            document_count = documents.len(),
            primary_count = split.primary.len(),
            condition_count = split.conditions.len(),
            warning_count = warnings.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Compliance verification completed"
        );

        Ok(VerifiedResults {
            primary: split.primary,
            conditions: split.conditions,
            warnings,
        })
    }
}

/// Encode every document concurrently, keeping upload order
async fn prepare_document_parts(
    documents: &[UploadedDocument],
) -> Result<Vec<ContentPart>, VerificationError> {
    let tasks = documents.iter().cloned().map(|document| {
        tokio::task::spawn_blocking(move || {
            ContentPart::from_document(&document, DEFAULT_DOCUMENT_NAME)
        })
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.map_err(|e| VerificationError::Internal(e.to_string())))
        .collect()
}

fn parse_results(arguments: &str) -> Result<Vec<ComplianceResult>, VerificationError> {
    let extracted: ExtractedVerification = serde_json::from_str(arguments).map_err(|e| {
        tracing::error!(
            arguments = %arguments.chars().take(500).collect::<String>(),
            error = %e,
            "Failed to parse JSON from verification tool call"
        );
        VerificationError::InvalidPayload(e.to_string())
    })?;

    Ok(extracted
        .verification_results
        .into_iter()
        .map(convert_result)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SYSTEM_SOURCE, Status};
    use crate::service::llm::LlmError;
    use crate::service::llm::testing::ScriptedChat;
    use serde_json::{Value, json};

    fn requirement(id: i64, parameter: &str) -> RequirementDetail {
        RequirementDetail {
            id,
            parameter: parameter.to_string(),
            requirement: "100 шт".to_string(),
            source: format!("Строка {id}"),
            notes: String::new(),
        }
    }

    fn tool_reply(arguments: Value) -> Arc<ScriptedChat> {
        Arc::new(ScriptedChat::with_message(json!({
            "content": null,
            "tool_calls": [{
                "type": "function",
                "function": { "name": "save_verification_results", "arguments": arguments }
            }]
        })))
    }

    fn row(id: i64, parameter: &str, source: &str, documents: &[&str]) -> Value {
        json!({
            "id": id,
            "parameter": parameter,
            "requirement": "100 шт",
            "source": source,
            "notes": "",
            "actualValue": "95 ₽",
            "status": "Соответствует",
            "explanation": "Самая низкая цена",
            "pageNumber": "2",
            "bestDocument": documents[0],
            "comparisons": documents.iter().map(|name| json!({
                "documentName": name,
                "actualValue": "95 ₽",
                "status": "Соответствует",
                "pageNumber": 2
            })).collect::<Vec<_>>()
        })
    }

    fn offers() -> Vec<UploadedDocument> {
        vec![
            UploadedDocument::new("alpha.pdf", None, b"%PDF-a".to_vec()),
            UploadedDocument::new("beta.png", None, b"png".to_vec()),
        ]
    }

    #[tokio::test]
    async fn test_no_documents_fails_before_calling_model() {
        let chat = tool_reply(json!("{}"));
        let service = VerificationService::new(chat.clone(), "m");
        assert!(matches!(
            service.verify(&[], &[requirement(1, "Кабель")]).await,
            Err(VerificationError::NoDocuments)
        ));
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rows_are_split_into_conditions_and_primary() {
        let names = ["alpha.pdf", "beta.png"];
        let arguments = json!({
            "verificationResults": [
                row(1, "Кабель", "Строка 1", &names),
                row(2, "Муфта", "Строка 2", &names),
                row(3, "Условия поставки", SYSTEM_SOURCE, &names),
            ]
        })
        .to_string();
        let chat = tool_reply(json!(arguments));
        let service = VerificationService::new(chat.clone(), "m");

        let requirements = vec![requirement(1, "Кабель"), requirement(2, "Муфта")];
        let verified = service.verify(&offers(), &requirements).await.unwrap();

        assert_eq!(verified.primary.len(), 2);
        assert_eq!(verified.conditions.len(), 1);
        assert_eq!(verified.primary[0].page_number, 2);
        assert_eq!(verified.primary[0].status, Status::Conforms);
        assert!(verified.warnings.is_empty());

        let request = chat.last_request();
        assert_eq!(request.tool_choice.unwrap()["function"]["name"], "save_verification_results");
        let parts = &request.messages[0].content;
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[1], ContentPart::File { file } if file.filename == "alpha.pdf"));
        assert!(matches!(&parts[2], ContentPart::ImageUrl { .. }));
        match &parts[3] {
            ContentPart::Text { text } => {
                assert!(text.starts_with("Here are the requirements to verify: "));
                assert!(text.contains("\"id\":5,\"parameter\":\"Условия оплаты\""));
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_object_arguments_and_coverage_warnings() {
        let arguments = json!({
            "verificationResults": [row(1, "Кабель", "Строка 1", &["alpha.pdf"])]
        });
        let chat = tool_reply(arguments);
        let service = VerificationService::new(chat, "m");

        let verified = service
            .verify(&offers(), &[requirement(1, "Кабель")])
            .await
            .unwrap();
        assert_eq!(verified.primary.len(), 1);
        assert_eq!(verified.warnings, vec!["Row 1: comparisons do not cover beta.png"]);
    }

    #[tokio::test]
    async fn test_missing_tool_call_is_an_error() {
        let chat = Arc::new(ScriptedChat::with_message(json!({ "content": "I could not" })));
        let service = VerificationService::new(chat, "m");
        assert!(matches!(
            service.verify(&offers(), &[requirement(1, "Кабель")]).await,
            Err(VerificationError::MissingToolCall)
        ));
    }

    #[tokio::test]
    async fn test_invalid_status_is_a_payload_error() {
        let mut bad = row(1, "Кабель", "Строка 1", &["alpha.pdf", "beta.png"]);
        bad["status"] = json!("OK");
        let chat = tool_reply(json!({ "verificationResults": [bad] }).to_string().into());
        let service = VerificationService::new(chat, "m");
        assert!(matches!(
            service.verify(&offers(), &[requirement(1, "Кабель")]).await,
            Err(VerificationError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_error_propagates() {
        let chat = Arc::new(ScriptedChat::replying(Err(LlmError::NotConfigured)));
        let service = VerificationService::new(chat, "m");
        assert!(matches!(
            service.verify(&offers(), &[requirement(1, "Кабель")]).await,
            Err(VerificationError::Llm(LlmError::NotConfigured))
        ));
    }

    #[tokio::test]
    async fn test_empty_result_list_is_returned_as_empty() {
        let chat = tool_reply(json!({ "verificationResults": [] }));
        let service = VerificationService::new(chat, "m");
        let verified = service
            .verify(&offers(), &[requirement(1, "Кабель")])
            .await
            .unwrap();
        assert!(verified.is_empty());
    }
}
