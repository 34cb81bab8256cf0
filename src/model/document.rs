//! Uploaded documents and their classification

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use utoipa::ToSchema;

const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const MIME_XLS: &str = "application/vnd.ms-excel";
const MIME_CSV: &str = "text/csv";
const MIME_PDF: &str = "application/pdf";
const MIME_PNG: &str = "image/png";
const MIME_JPEG: &str = "image/jpeg";
const MIME_WEBP: &str = "image/webp";
const MIME_OCTET_STREAM: &str = "application/octet-stream";

const SPREADSHEET_MIME_TYPES: &[&str] = &[MIME_XLSX, MIME_XLS, MIME_CSV];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document '{0}' is not valid base64")]
    InvalidEncoding(String),

    #[error("Document '{0}' is empty")]
    Empty(String),

    #[error("Document '{name}' has unsupported type '{mime_type}' for {role}")]
    Unsupported {
        name: String,
        mime_type: String,
        role: DocumentRole,
    },
}

/// What a document is used for in the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRole {
    Requirements,
    SupplierProposal,
}

impl std::fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentRole::Requirements => f.write_str("a requirements document"),
            DocumentRole::SupplierProposal => f.write_str("a supplier proposal"),
        }
    }
}

/// Broad content class driving how a document is sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Spreadsheet,
    Pdf,
    Image,
    Other,
}

/// Document upload as received over the API
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    /// Original file name, used as the document's identity in results
    pub name: String,
    /// MIME type reported by the client; inferred from the extension when absent
    #[serde(default)]
    pub mime_type: Option<String>,
    /// File content, standard base64
    pub data_base64: String,
}

/// A decoded document held in memory
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, data: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime_type = mime_type
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .or_else(|| mime_from_extension(&name).map(str::to_string))
            .unwrap_or_default();
        Self {
            name,
            mime_type,
            data: data.into(),
        }
    }

    /// Decode an API upload and check it is acceptable for `role`
    pub fn from_upload(upload: DocumentUpload, role: DocumentRole) -> Result<Self, DocumentError> {
        let data = STANDARD
            .decode(upload.data_base64.trim())
            .map_err(|_| DocumentError::InvalidEncoding(upload.name.clone()))?;
        if data.is_empty() {
            return Err(DocumentError::Empty(upload.name));
        }
        let document = Self::new(upload.name, upload.mime_type.as_deref(), data);
        document.ensure_accepted(role)?;
        Ok(document)
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }

    pub fn kind(&self) -> DocumentKind {
        if self.is_spreadsheet() {
            DocumentKind::Spreadsheet
        } else if self.mime_type.starts_with("image/") {
            DocumentKind::Image
        } else if self.mime_type == MIME_PDF {
            DocumentKind::Pdf
        } else {
            DocumentKind::Other
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        if SPREADSHEET_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return true;
        }
        self.extension()
            .is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn ensure_accepted(&self, role: DocumentRole) -> Result<(), DocumentError> {
        let accepted = match role {
            DocumentRole::Requirements => {
                self.is_spreadsheet()
                    || matches!(self.mime_type.as_str(), MIME_PDF | MIME_PNG | MIME_JPEG | MIME_WEBP)
            }
            DocumentRole::SupplierProposal => {
                !self.is_spreadsheet()
                    && matches!(self.mime_type.as_str(), MIME_PDF | MIME_PNG | MIME_JPEG | MIME_WEBP)
            }
        };
        if accepted {
            Ok(())
        } else {
            Err(DocumentError::Unsupported {
                name: self.name.clone(),
                mime_type: self.content_type().to_string(),
                role,
            })
        }
    }

    /// MIME type to advertise, falling back to a generic binary type
    pub fn content_type(&self) -> &str {
        if self.mime_type.is_empty() {
            MIME_OCTET_STREAM
        } else {
            &self.mime_type
        }
    }

    /// `data:<mime>;base64,<payload>` URL of the content
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type(), STANDARD.encode(&self.data))
    }
}

fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "xlsx" => MIME_XLSX,
        "xls" => MIME_XLS,
        "csv" => MIME_CSV,
        "pdf" => MIME_PDF,
        "png" => MIME_PNG,
        "jpg" | "jpeg" => MIME_JPEG,
        "webp" => MIME_WEBP,
        _ => return None,
    };
    Some(mime)
}
