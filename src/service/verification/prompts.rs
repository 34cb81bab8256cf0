//! Prompts and tool definition for compliance verification

use serde_json::{Value, json};

use crate::model::{RequirementDetail, Status, UploadedDocument};

/// Name of the function the model is forced to call
pub const VERIFICATION_TOOL_NAME: &str = "save_verification_results";

/// Filename used for supplier documents uploaded without one
pub const DEFAULT_DOCUMENT_NAME: &str = "document";

const VERIFICATION_INSTRUCTIONS: &str = r#"You are a meticulous compliance verification expert. Analyze MULTIPLE supplier proposal documents against the provided list of requirements and highlight the best offer.

INSTRUCTIONS:
For EACH requirement in the provided JSON data:
1. Review EVERY supplier document listed below and locate the details relevant to the requirement, including textual conditions such as "Условия поставки", "Срок поставки" and "Условия оплаты".
2. For each supplier decide whether the offer satisfies the requirement and extract the exact value. Always cover prices and commercial figures (cost, discounts, currency), delivery terms (Incoterms, warehouse, shipping), delivery deadlines (dates or ranges) and payment terms (prepayment share, deferral, schedule). Copy the text verbatim. When a document does not state the parameter, set actualValue to "Не указано в документе", status to "Не найдено" and say so in notes/explanation. For product lines ALWAYS put the price (per unit or total) with quantity and currency into actualValue; if no price is given write "Цена не указана".
3. Pick the single best offer ('bestDocument') that satisfies the requirement on the best terms: lowest price among conforming offers, shortest reasonable deadline, most favourable payment or delivery terms for the buyer. When nothing fully conforms, pick the closest offer and mark it "Частичное соответствие" or "Не соответствует".
4. Set 'actualValue' to the value from the bestDocument, keeping units, currency symbols and wording unchanged.
5. Provide a 'comparisons' array that covers EVERY supplier document. Always state the price (and quantity where relevant) in each actualValue. Use 'notes' to summarise the key differences (for example more expensive by X ₽, longer deadline, worse payment terms).
6. Set the overall compliance 'status' of the best offer using exactly one of: "Соответствует", "Не соответствует", "Частичное соответствие", "Не найдено".
7. Write a concise 'explanation' in Russian of why the bestDocument was chosen, comparing prices, deadlines and terms with the other offers.
8. Set 'pageNumber' to the page where the best offer was found (0 if not available).
9. 'bestDocument' and every 'documentName' must EXACTLY match one of the filenames below.
10. Keep numbers formatted as in the sources; do not round.
11. Return 'id', 'parameter', 'requirement', 'source' and 'notes' of each requirement unchanged."#;

/// Display name of the supplier document at `index`
pub fn document_label(document: &UploadedDocument, index: usize) -> String {
    if document.name.trim().is_empty() {
        format!("{DEFAULT_DOCUMENT_NAME}-{}", index + 1)
    } else {
        document.name.clone()
    }
}

/// Build the instruction text with the numbered supplier file list
pub fn build_verification_prompt(documents: &[UploadedDocument]) -> String {
    let suppliers = documents
        .iter()
        .enumerate()
        .map(|(index, document)| format!("{}. {}", index + 1, document_label(document, index)))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{VERIFICATION_INSTRUCTIONS}\n\nSupplier files:\n{suppliers}")
}

/// Trailing text part carrying the requirement rows
pub fn build_requirements_message(requirements: &[RequirementDetail]) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Here are the requirements to verify: {}",
        serde_json::to_string(requirements)?
    ))
}

fn status_enum() -> Value {
    json!({
        "type": "string",
        "enum": Status::ALL.iter().map(Status::as_str).collect::<Vec<_>>()
    })
}

/// Function tool the model must call with its results
pub fn verification_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": VERIFICATION_TOOL_NAME,
            "description": "Saves the results of the compliance verification.",
            "parameters": {
                "type": "object",
                "properties": {
                    "verificationResults": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "number" },
                                "parameter": { "type": "string" },
                                "requirement": { "type": "string" },
                                "source": { "type": "string" },
                                "notes": { "type": "string" },
                                "actualValue": { "type": "string" },
                                "status": status_enum(),
                                "explanation": { "type": "string" },
                                "pageNumber": {
                                    "type": "number",
                                    "description": "The page number where the information was found. 0 if not applicable."
                                },
                                "bestDocument": {
                                    "type": "string",
                                    "description": "Exact filename of the supplier document that offers the best match."
                                },
                                "comparisons": {
                                    "type": "array",
                                    "minItems": 1,
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "documentName": { "type": "string" },
                                            "actualValue": { "type": "string" },
                                            "status": status_enum(),
                                            "pageNumber": { "type": "number" },
                                            "notes": { "type": "string" }
                                        },
                                        "required": ["documentName", "actualValue", "status", "pageNumber"],
                                        "additionalProperties": false
                                    }
                                }
                            },
                            "required": [
                                "id", "parameter", "requirement", "source", "notes", "actualValue",
                                "status", "explanation", "pageNumber", "bestDocument", "comparisons"
                            ],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["verificationResults"]
            }
        }
    })
}

/// `tool_choice` forcing the verification tool
pub fn verification_tool_choice() -> Value {
    json!({ "type": "function", "function": { "name": VERIFICATION_TOOL_NAME } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplier_list_is_numbered_with_fallback_names() {
        let documents = vec![
            UploadedDocument::new("alpha.pdf", None, b"x".to_vec()),
            UploadedDocument::new("", Some("image/png"), b"x".to_vec()),
        ];
        let prompt = build_verification_prompt(&documents);
        assert!(prompt.ends_with("Supplier files:\n1. alpha.pdf\n2. document-2"));
    }

    #[test]
    fn test_requirements_message_embeds_json() {
        let message = build_requirements_message(&[RequirementDetail::blank(7)]).unwrap();
        assert_eq!(
            message,
            r#"Here are the requirements to verify: [{"id":7,"parameter":"","requirement":"","source":"","notes":""}]"#
        );
    }

    #[test]
    fn test_tool_schema_restricts_status_tokens() {
        let tool = verification_tool();
        let item = &tool["function"]["parameters"]["properties"]["verificationResults"]["items"];
        assert_eq!(
            item["properties"]["status"]["enum"],
            json!(["Соответствует", "Не соответствует", "Частичное соответствие", "Не найдено"])
        );
        assert_eq!(item["properties"]["comparisons"]["minItems"], 1);
        assert_eq!(item["required"].as_array().unwrap().len(), 11);
        assert_eq!(verification_tool_choice()["function"]["name"], VERIFICATION_TOOL_NAME);
    }
}
