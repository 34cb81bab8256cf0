//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency injection,
//! making it easier to manage the application lifecycle and test services.

use std::sync::Arc;

use crate::model::Config;
use crate::service::llm::ChatCompletions;
use crate::service::{
    ExtractionService, LlmClient, StateStore, VerificationService, WorkflowController,
};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Chat completions client shared by both model-backed services
    pub llm_client: Arc<LlmClient>,
    /// Owner of the workflow session
    pub controller: Arc<WorkflowController>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. State directory creation
    /// 2. LLM client initialization (the API key may be absent)
    /// 3. Workflow restoration from the persisted entries
    pub fn new(config: Config) -> Result<Self, AppError> {
        let store = StateStore::open(&config.storage.state_dir)
            .map_err(|e| AppError::StateStore(e.to_string()))?;

        let llm_client = Arc::new(
            LlmClient::new(&config.llm, config.api_key.clone())
                .map_err(|e| AppError::InvalidConfig(e.to_string()))?,
        );

        let controller = Arc::new(Self::build_controller(
            store,
            llm_client.clone(),
            &config.llm.model,
        ));

        Ok(Self {
            llm_client,
            controller,
        })
    }

    /// Build the workflow controller with all dependencies
    fn build_controller(
        store: StateStore,
        chat: Arc<dyn ChatCompletions>,
        model: &str,
    ) -> WorkflowController {
        let extraction_service = ExtractionService::new(Arc::clone(&chat), model);
        let verification_service = VerificationService::new(chat, model);

        WorkflowController::new(store, extraction_service, verification_service)
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// State directory could not be prepared
    #[error("State store initialization failed: {0}")]
    StateStore(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
