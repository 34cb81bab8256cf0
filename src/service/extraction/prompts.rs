//! Prompts and output schema for requirement extraction

use serde_json::{Value, json};

/// Name of the structured output schema
pub const REQUIREMENTS_SCHEMA_NAME: &str = "requirements_schema";

/// Default file name for spreadsheet uploads without a name
pub const DEFAULT_SPREADSHEET_NAME: &str = "document.xlsx";

/// Default file name for other uploads without a name
pub const DEFAULT_DOCUMENT_NAME: &str = "document";

/// Extraction instructions
pub const EXTRACTION_PROMPT: &str = r#"You are an expert system for analyzing technical documents. Your task is to process a document with technical requirements and extract entities.

INSTRUCTIONS:
1. Walk the table ROW BY ROW. Every row (a product line item or a condition) becomes exactly ONE 'requirement' object. Never create separate records for individual cells.
2. Fill the fields as follows:
   - 'id': a unique number, incrementing from 1 without gaps.
   - 'parameter': the short name of the item or condition in the row (a product, a service or a type of condition).
   - 'requirement': join every other meaningful column of the row into a single text in the form "Кол-во: 100; Ед. изм.: шт; ...". Keep the original wording, units and currency.
   - 'source': the sheet/page and row number, for example "Строка 4" or "Лист 1, строка 4", or the exact section of the document.
   - 'notes': briefly explain missing values or add comments; if there is nothing to add, write "Значение присутствует".
3. Always keep condition parameters (for example "Условия поставки", "Срок поставки", "Условия оплаты"), technical characteristics and prices. Copy the text verbatim with the original punctuation and units.
4. When a row holds several sub-values (several prices or conditions), list them in 'requirement' separated by semicolons.
5. If the file is a spreadsheet, use the converted tabular text that accompanies this prompt to understand each row. Preserve numerical values (especially currency) exactly as they appear.
6. Output a single JSON object with an array named 'requirements'. Adhere to the provided JSON schema.
7. Write all extracted text in Russian and keep the original units and currency symbols."#;

/// Build the extraction instruction text
pub fn build_extraction_prompt(limit: Option<u32>) -> String {
    match limit {
        Some(limit) => format!(
            "{EXTRACTION_PROMPT}\nIMPORTANT: Process only the first {limit} rows supplied."
        ),
        None => EXTRACTION_PROMPT.to_string(),
    }
}

/// Text part carrying the flattened spreadsheet rows
pub fn build_spreadsheet_context(flattened: &str) -> String {
    format!("Tabular representation of the rows:\n{flattened}")
}

/// `response_format` declaring the strict requirements schema
pub fn requirements_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": REQUIREMENTS_SCHEMA_NAME,
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "requirements": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "number" },
                                "parameter": { "type": "string" },
                                "requirement": { "type": "string" },
                                "source": { "type": "string" },
                                "notes": { "type": "string" }
                            },
                            "required": ["id", "parameter", "requirement", "source", "notes"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["requirements"],
                "additionalProperties": false
            }
        }
    })
}
