//! Error types for requirement extraction

use thiserror::Error;

use crate::service::llm::LlmError;
use crate::service::spreadsheet::SpreadsheetError;

/// Error type for requirement extraction
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Could not read the spreadsheet: {0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("The API returned invalid JSON for extraction: {0}")]
    InvalidPayload(String),
}
