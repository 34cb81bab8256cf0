pub mod export;
pub mod extraction;
pub mod llm;
pub mod presentation;
pub mod spreadsheet;
pub mod store;
pub mod verification;
pub mod workflow;

pub use extraction::ExtractionService;
pub use llm::LlmClient;
pub use store::StateStore;
pub use verification::VerificationService;
pub use workflow::WorkflowController;
