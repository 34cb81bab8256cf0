//! Three-step compliance workflow: extract, verify, done
//!
//! [`WorkflowController`] owns the session state, persists it at every
//! transition and edit, and runs at most one remote step at a time. The
//! session lock is never held across a model call; a reset during a call
//! bumps the session generation so the late result is discarded.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utoipa::ToSchema;

use crate::model::{
    ComplianceResult, DocumentError, ResultSet, RowEditError, RowField, UploadedDocument,
};
use crate::service::export::{self, ColumnLabels, ExportError};
use crate::service::extraction::{ExtractionError, ExtractionService};
use crate::service::llm::LlmError;
use crate::service::presentation::{
    self, ComplianceStats, ConditionHighlight, DocumentConditions, ViewerState,
};
use crate::service::store::{StateKey, StateStore, StoreError};
use crate::service::verification::prompts::document_label;
use crate::service::verification::{VerificationError, VerificationService};

/// Workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Step {
    /// Waiting for a requirements document
    #[default]
    Extract,
    /// Requirement rows extracted, waiting for supplier documents
    Verify,
    /// Compliance rows available
    Done,
}

/// Remote step that may be in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Extraction,
    Verification,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Extraction => f.write_str("extraction"),
            Operation::Verification => f.write_str("verification"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkflowError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    RemoteApi(String),

    #[error("{0}")]
    MalformedResponse(String),

    #[error("{0}")]
    EmptyResult(String),

    #[error("{0}")]
    NotFound(String),

    #[error("An {0} is already in progress")]
    Busy(Operation),

    #[error("The workflow was reset while the {0} was running; its result was discarded")]
    Superseded(Operation),

    #[error("Failed to persist workflow state: {0}")]
    Storage(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl From<LlmError> for WorkflowError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::NotConfigured | LlmError::InvalidEndpoint(_) => {
                WorkflowError::Configuration(e.to_string())
            }
            LlmError::MalformedResponse(_) => WorkflowError::MalformedResponse(e.to_string()),
            LlmError::Api { .. } | LlmError::ProviderRejected | LlmError::Transport(_) => {
                WorkflowError::RemoteApi(e.to_string())
            }
        }
    }
}

impl From<ExtractionError> for WorkflowError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Llm(e) => e.into(),
            ExtractionError::Spreadsheet(_) => WorkflowError::Input(e.to_string()),
            ExtractionError::InvalidPayload(_) => WorkflowError::MalformedResponse(e.to_string()),
        }
    }
}

impl From<VerificationError> for WorkflowError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Llm(e) => e.into(),
            VerificationError::NoDocuments => WorkflowError::Input(e.to_string()),
            VerificationError::MissingToolCall | VerificationError::InvalidPayload(_) => {
                WorkflowError::MalformedResponse(e.to_string())
            }
            VerificationError::Internal(_) => WorkflowError::Internal(e.to_string()),
        }
    }
}

impl From<DocumentError> for WorkflowError {
    fn from(e: DocumentError) -> Self {
        WorkflowError::Input(e.to_string())
    }
}

impl From<RowEditError> for WorkflowError {
    fn from(e: RowEditError) -> Self {
        match e {
            RowEditError::NoSuchRow(_) => WorkflowError::NotFound(e.to_string()),
            _ => WorkflowError::Input(e.to_string()),
        }
    }
}

impl From<ExportError> for WorkflowError {
    fn from(e: ExportError) -> Self {
        WorkflowError::Internal(e.to_string())
    }
}

/// Remote step currently running
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InFlight {
    pub operation: Operation,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
}

/// Everything a client needs to render the workflow
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub step: Step,
    /// Requirement rows before verification, compliance rows after it
    pub results: Option<ResultSet>,
    /// Rows answering the injected condition targets
    pub conditions: Vec<ComplianceResult>,
    pub in_flight: Option<InFlight>,
    /// Data-quality findings of the last verification
    pub warnings: Vec<String>,
    pub requirements_document: Option<String>,
    /// Supplier document names in upload order
    pub documents: Vec<String>,
    pub viewer: ViewerState,
    pub labels: ColumnLabels,
}

/// Condition summaries of a finished verification
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsView {
    pub highlights: Vec<ConditionHighlight>,
    pub per_document: Vec<DocumentConditions>,
}

#[derive(Debug)]
struct Running {
    operation: Operation,
    started_at: DateTime<Utc>,
    started: Instant,
    generation: u64,
}

#[derive(Debug, Default)]
struct Session {
    step: Step,
    results: Option<ResultSet>,
    conditions: Vec<ComplianceResult>,
    warnings: Vec<String>,
    requirements_document: Option<String>,
    documents: Vec<UploadedDocument>,
    viewer: ViewerState,
    labels: ColumnLabels,
    running: Option<Running>,
    generation: u64,
}

impl Session {
    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        match &self.running {
            Some(running) => Err(WorkflowError::Busy(running.operation)),
            None => Ok(()),
        }
    }

    fn ensure_done(&self) -> Result<&[ComplianceResult], WorkflowError> {
        match (&self.step, &self.results) {
            (Step::Done, Some(ResultSet::Compliance(rows))) => Ok(rows),
            _ => Err(WorkflowError::Input(
                "Results are available only after verification".to_string(),
            )),
        }
    }

    fn document_names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }

    fn begin(&mut self, operation: Operation) -> u64 {
        self.running = Some(Running {
            operation,
            started_at: Utc::now(),
            started: Instant::now(),
            generation: self.generation,
        });
        self.generation
    }

    /// Release the in-flight slot, failing when a reset superseded the call
    fn finish(&mut self, operation: Operation, generation: u64) -> Result<(), WorkflowError> {
        if self.generation != generation {
            tracing::warn!(
                operation = %operation,
                "Discarding result of an operation started before a reset"
            );
            return Err(WorkflowError::Superseded(operation));
        }
        if let Some(running) = self.running.take() {
            tracing::debug!(
                operation = %running.operation,
                generation = running.generation,
                elapsed_ms = running.started.elapsed().as_millis(),
                "Operation finished"
            );
        }
        Ok(())
    }

    fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            step: self.step,
            results: self.results.clone(),
            conditions: self.conditions.clone(),
            in_flight: self.running.as_ref().map(|running| InFlight {
                operation: running.operation,
                started_at: running.started_at,
                elapsed_seconds: running.started.elapsed().as_secs(),
            }),
            warnings: self.warnings.clone(),
            requirements_document: self.requirements_document.clone(),
            documents: self.document_names(),
            viewer: self.viewer,
            labels: self.labels.clone(),
        }
    }
}

/// In-flight claim on the session.
///
/// Dropping it unreleased (the caller's future was cancelled or panicked)
/// frees the session unless a reset already did.
struct InFlightSlot<'a> {
    controller: &'a WorkflowController,
    operation: Operation,
    generation: u64,
    released: bool,
}

impl InFlightSlot<'_> {
    fn release(mut self, session: &mut Session) -> Result<(), WorkflowError> {
        self.released = true;
        session.finish(self.operation, self.generation)
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut session = self.controller.session();
        if session.generation == self.generation && session.running.take().is_some() {
            tracing::warn!(
                operation = %self.operation,
                "Operation abandoned before completion, session released"
            );
        }
    }
}

/// Owner of the workflow session
pub struct WorkflowController {
    session: Mutex<Session>,
    store: StateStore,
    extraction: ExtractionService,
    verification: VerificationService,
}

impl WorkflowController {
    /// Create the controller, restoring persisted state from `store`
    pub fn new(
        store: StateStore,
        extraction: ExtractionService,
        verification: VerificationService,
    ) -> Self {
        let session = restore(&store);
        tracing::info!(
            step = ?session.step,
            rows = session.results.as_ref().map_or(0, ResultSet::len),
            conditions = session.conditions.len(),
            "Workflow state restored"
        );

        Self {
            session: Mutex::new(session),
            store,
            extraction,
            verification,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, session: &Session) -> Result<(), StoreError> {
        persist(&self.store, session)
    }

    /// Mark `operation` as running until the returned slot is released or dropped
    fn claim(&self, session: &mut Session, operation: Operation) -> InFlightSlot<'_> {
        InFlightSlot {
            controller: self,
            operation,
            generation: session.begin(operation),
            released: false,
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.session().snapshot()
    }

    /// Whether the state directory is still present
    pub fn storage_ready(&self) -> bool {
        self.store.dir().is_dir()
    }

    /// Extract requirement rows from the requirements document.
    ///
    /// Prior results and condition rows are cleared before the call.
    pub async fn extract(
        &self,
        document: Option<UploadedDocument>,
        limit: Option<u32>,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let (document, slot) = {
            let mut session = self.session();
            session.ensure_idle()?;
            if session.step != Step::Extract {
                return Err(WorkflowError::Input(
                    "Extraction is only possible before requirements are extracted; reset the workflow first"
                        .to_string(),
                ));
            }
            let Some(document) = document else {
                return Err(WorkflowError::Input(
                    "Please upload a requirements document".to_string(),
                ));
            };

            session.results = None;
            session.conditions.clear();
            session.warnings.clear();
            session.requirements_document = Some(document.name.clone());
            self.persist(&session)?;

            let slot = self.claim(&mut session, Operation::Extraction);
            (document, slot)
        };

        tracing::info!(document = %document.name, limit = ?limit, "Extraction started");
        let outcome = self.extraction.extract(&document, limit).await;

        let mut session = self.session();
        slot.release(&mut session)?;

        let rows = outcome.inspect_err(|e| {
            tracing::error!(document = %document.name, error = %e, "Extraction failed");
        })?;
        if rows.is_empty() {
            return Err(WorkflowError::EmptyResult(
                "Could not extract any requirements from the document".to_string(),
            ));
        }

        session.results = Some(ResultSet::Requirements(rows));
        session.step = Step::Verify;
        self.persist(&session)?;

        tracing::info!(
            document = %document.name,
            requirement_count = session.results.as_ref().map_or(0, ResultSet::len),
            "Requirements extracted"
        );
        Ok(session.snapshot())
    }

    /// Verify the extracted requirements against the supplier documents
    pub async fn verify(
        &self,
        documents: Vec<UploadedDocument>,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let (documents, requirements, slot) = {
            let mut session = self.session();
            session.ensure_idle()?;
            if session.step != Step::Verify {
                return Err(WorkflowError::Input(
                    "Verification requires extracted requirements".to_string(),
                ));
            }
            if documents.is_empty() {
                return Err(WorkflowError::Input(
                    "Please upload supplier documents for verification".to_string(),
                ));
            }
            let requirements = match &session.results {
                Some(ResultSet::Requirements(rows)) if !rows.is_empty() => rows.clone(),
                _ => {
                    return Err(WorkflowError::Input(
                        "There are no requirements to verify".to_string(),
                    ));
                }
            };

            // Unnamed uploads take the label the model sees, so every view agrees on it
            let documents: Vec<UploadedDocument> = documents
                .into_iter()
                .enumerate()
                .map(|(index, mut document)| {
                    document.name = document_label(&document, index);
                    document
                })
                .collect();

            session.conditions.clear();
            session.warnings.clear();
            session.viewer = ViewerState::for_documents(documents.len());
            session.documents = documents.clone();
            self.persist(&session)?;

            let slot = self.claim(&mut session, Operation::Verification);
            (documents, requirements, slot)
        };

        tracing::info!(
            document_count = documents.len(),
            requirement_count = requirements.len(),
            "Verification started"
        );
        let outcome = self.verification.verify(&documents, &requirements).await;

        let mut session = self.session();
        slot.release(&mut session)?;

        let verified = outcome.inspect_err(|e| {
            tracing::error!(error = %e, "Verification failed");
        })?;
        if verified.is_empty() {
            return Err(WorkflowError::EmptyResult(
                "Verification finished but no matches were found".to_string(),
            ));
        }

        session.conditions = verified.conditions;
        session.results = Some(ResultSet::Compliance(verified.primary));
        session.warnings = verified.warnings;
        session.step = Step::Done;
        self.persist(&session)?;

        tracing::info!(
            rows = session.results.as_ref().map_or(0, ResultSet::len),
            conditions = session.conditions.len(),
            warnings = session.warnings.len(),
            "Verification results stored"
        );
        Ok(session.snapshot())
    }

    /// Return to the first step, dropping all results and persisted entries.
    ///
    /// Column labels survive a reset.
    pub fn reset(&self) -> Result<WorkflowSnapshot, WorkflowError> {
        let mut session = self.session();
        if let Some(running) = &session.running {
            tracing::warn!(operation = %running.operation, "Reset while an operation is running");
        }

        let labels = std::mem::take(&mut session.labels);
        let generation = session.generation + 1;
        *session = Session {
            labels,
            generation,
            ..Session::default()
        };
        self.store.clear()?;

        tracing::info!("Workflow reset");
        Ok(session.snapshot())
    }

    fn editable_results<'a>(
        session: &'a mut Session,
    ) -> Result<&'a mut ResultSet, WorkflowError> {
        session.ensure_idle()?;
        let step = session.step;
        match step {
            Step::Extract => Err(WorkflowError::Input(
                "There are no results to edit yet".to_string(),
            )),
            Step::Verify => Ok(session
                .results
                .get_or_insert_with(|| ResultSet::Requirements(Vec::new()))),
            Step::Done => Ok(session
                .results
                .get_or_insert_with(|| ResultSet::Compliance(Vec::new()))),
        }
    }

    /// Append an empty row and return its id
    pub fn add_row(&self) -> Result<i64, WorkflowError> {
        let mut session = self.session();
        let id = Self::editable_results(&mut session)?.push_blank();
        self.persist(&session)?;
        tracing::debug!(id, "Row added");
        Ok(id)
    }

    /// Set one field of the row at `index`
    pub fn update_row(
        &self,
        index: usize,
        field: RowField,
        value: &str,
    ) -> Result<WorkflowSnapshot, WorkflowError> {
        let mut session = self.session();
        Self::editable_results(&mut session)?.update(index, field, value)?;
        self.persist(&session)?;
        tracing::debug!(index, field = %field, "Row updated");
        Ok(session.snapshot())
    }

    /// Delete the row with the given id
    pub fn delete_row(&self, id: i64) -> Result<WorkflowSnapshot, WorkflowError> {
        let mut session = self.session();
        if !Self::editable_results(&mut session)?.remove(id) {
            return Err(WorkflowError::NotFound(format!("No row with id {id}")));
        }
        self.persist(&session)?;
        tracing::debug!(id, "Row deleted");
        Ok(session.snapshot())
    }

    /// Rename a column of the result table
    pub fn rename_label(&self, field: RowField, label: &str) -> ColumnLabels {
        let mut session = self.session();
        session.labels.set(field, label);
        session.labels.clone()
    }

    pub fn dashboard(&self) -> Result<ComplianceStats, WorkflowError> {
        let session = self.session();
        Ok(presentation::compliance_stats(session.ensure_done()?))
    }

    pub fn conditions(&self) -> Result<ConditionsView, WorkflowError> {
        let session = self.session();
        let primary = session.ensure_done()?;
        Ok(ConditionsView {
            highlights: presentation::condition_highlights(&session.conditions, primary),
            per_document: presentation::per_document_conditions(
                &session.conditions,
                primary,
                &session.document_names(),
            ),
        })
    }

    /// Show `page`, switching to `document_name` when it was uploaded
    pub fn page_jump(
        &self,
        page: u32,
        document_name: Option<&str>,
    ) -> Result<ViewerState, WorkflowError> {
        if page == 0 {
            return Err(WorkflowError::Input("Page numbers start at 1".to_string()));
        }
        let mut session = self.session();
        if session.documents.is_empty() {
            return Err(WorkflowError::Input(
                "No supplier documents are loaded".to_string(),
            ));
        }
        let names = session.document_names();
        session.viewer.page_jump(page, document_name, &names);
        Ok(session.viewer)
    }

    /// Show the supplier document at `index` from its first page
    pub fn select_document(&self, index: usize) -> Result<ViewerState, WorkflowError> {
        let mut session = self.session();
        if index >= session.documents.len() {
            return Err(WorkflowError::NotFound(format!(
                "No supplier document at index {index}"
            )));
        }
        session.viewer.select(index);
        Ok(session.viewer)
    }

    /// Supplier document at `index`
    pub fn document(&self, index: usize) -> Result<UploadedDocument, WorkflowError> {
        self.session()
            .documents
            .get(index)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("No supplier document at index {index}")))
    }

    /// CSV export of the current result rows
    pub fn export_csv(&self) -> Result<String, WorkflowError> {
        let session = self.session();
        let Some(results) = &session.results else {
            return Err(WorkflowError::Input("There are no results to export".to_string()));
        };
        Ok(export::to_csv(results, &session.labels)?)
    }
}

fn persist(store: &StateStore, session: &Session) -> Result<(), StoreError> {
    store.save(StateKey::AppStep, &session.step)?;
    match &session.results {
        Some(results) => store.save(StateKey::AnalysisResults, results)?,
        None => store.remove(StateKey::AnalysisResults)?,
    }
    if session.conditions.is_empty() {
        store.remove(StateKey::ConditionResults)?;
    } else {
        store.save(StateKey::ConditionResults, &session.conditions)?;
    }
    Ok(())
}

fn load_or_default<T: DeserializeOwned + Default>(store: &StateStore, key: StateKey) -> T {
    match store.load(key) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(entry = %key, error = %e, "Could not restore persisted state entry");
            T::default()
        }
    }
}

/// Rebuild the session from persisted entries, repairing inconsistencies
fn restore(store: &StateStore) -> Session {
    let mut step: Step = load_or_default(store, StateKey::AppStep);
    let mut results: Option<ResultSet> = load_or_default(store, StateKey::AnalysisResults);
    let mut conditions: Vec<ComplianceResult> = load_or_default(store, StateKey::ConditionResults);

    let consistent_step = match (&results, step) {
        (None, Step::Verify | Step::Done) => Step::Extract,
        (Some(ResultSet::Requirements(_)), Step::Done) => Step::Verify,
        (Some(ResultSet::Compliance(_)), Step::Verify) => Step::Done,
        _ => step,
    };
    if consistent_step != step {
        tracing::warn!(
            persisted = ?step,
            restored = ?consistent_step,
            "Persisted step does not match persisted results"
        );
        step = consistent_step;
    }

    if step == Step::Extract && results.is_some() {
        tracing::warn!("Dropping persisted results left over in the extraction step");
        results = None;
    }
    if step != Step::Done && !conditions.is_empty() {
        tracing::warn!("Dropping persisted condition rows outside the done step");
        conditions.clear();
    }

    let session = Session {
        step,
        results,
        conditions,
        ..Session::default()
    };
    if let Err(e) = persist(store, &session) {
        tracing::warn!(error = %e, "Could not write back restored workflow state");
    }
    session
}
