pub mod conditions;
pub mod config;
pub mod document;
pub mod extracted;
pub mod requirements;

pub use conditions::{ConditionTopic, NOT_STATED, SYSTEM_NOTES, SYSTEM_SOURCE};
pub use config::{Config, LlmConfig};
pub use document::{DocumentError, DocumentKind, DocumentRole, DocumentUpload, UploadedDocument};
pub use requirements::*;
