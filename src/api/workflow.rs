//! REST API endpoints for the extraction and verification workflow

use actix_web::{HttpResponse, delete, get, patch, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::error::{ApiError, ErrorResponse};
use crate::model::{
    ComplianceResult, ConditionTopic, DocumentRole, DocumentUpload, OfferComparison,
    RequirementDetail, ResultSet, RowField, Status, UploadedDocument,
};
use crate::service::export::{ColumnLabels, EXPORT_FILE_NAME};
use crate::service::presentation::{
    ComplianceBand, ComplianceStats, ConditionHighlight, DocumentCondition, DocumentConditions,
    ViewerState,
};
use crate::service::workflow::{
    ConditionsView, InFlight, Operation, Step, WorkflowController, WorkflowSnapshot,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        get_workflow,
        extract,
        verify,
        reset,
        add_row,
        update_row,
        delete_row,
        rename_label,
        dashboard,
        conditions,
        page_jump,
        select_document,
        get_document,
        export_csv,
        crate::api::health::liveness,
        crate::api::health::readiness,
    ),
    components(schemas(
        WorkflowSnapshot,
        Step,
        Operation,
        InFlight,
        ResultSet,
        RequirementDetail,
        ComplianceResult,
        OfferComparison,
        Status,
        RowField,
        ColumnLabels,
        ViewerState,
        ComplianceStats,
        ComplianceBand,
        ConditionsView,
        ConditionHighlight,
        DocumentConditions,
        DocumentCondition,
        ConditionTopic,
        DocumentUpload,
        ExtractRequest,
        VerifyRequest,
        EditRowRequest,
        LabelRequest,
        PageJumpRequest,
        RowCreated,
        ErrorResponse,
        crate::api::health::HealthStatus,
        crate::api::health::ReadinessStatus,
        crate::api::health::DependencyHealth,
    )),
    tags(
        (name = "workflow", description = "Requirement extraction and offer verification"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Requirements document to extract rows from
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtractRequest {
    pub document: Option<DocumentUpload>,
    /// Process only the first N rows; 0 or absent means all rows
    pub limit: Option<u32>,
}

/// Supplier documents to verify the requirement rows against
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditRowRequest {
    pub field: RowField,
    pub value: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LabelRequest {
    pub field: RowField,
    pub label: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageJumpRequest {
    pub page: u32,
    /// Switch to this supplier document when it was uploaded
    pub document_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RowCreated {
    pub id: i64,
}

/// Current workflow state
#[utoipa::path(
    get,
    path = "/v1/workflow",
    responses(
        (status = 200, description = "Workflow state", body = WorkflowSnapshot)
    ),
    tag = "workflow"
)]
#[get("/v1/workflow")]
pub async fn get_workflow(controller: web::Data<WorkflowController>) -> HttpResponse {
    HttpResponse::Ok().json(controller.snapshot())
}

/// Extract requirement rows from a requirements document
#[utoipa::path(
    post,
    path = "/v1/workflow/extract",
    request_body = ExtractRequest,
    responses(
        (status = 200, description = "Requirements extracted", body = WorkflowSnapshot),
        (status = 400, description = "Missing or unsupported document", body = ErrorResponse),
        (status = 409, description = "Another operation is running", body = ErrorResponse),
        (status = 422, description = "No requirements found", body = ErrorResponse),
        (status = 502, description = "Model API failure", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/extract")]
pub async fn extract(
    controller: web::Data<WorkflowController>,
    request: web::Json<ExtractRequest>,
) -> Result<HttpResponse, ApiError> {
    let ExtractRequest { document, limit } = request.into_inner();
    let document = document
        .map(|upload| UploadedDocument::from_upload(upload, DocumentRole::Requirements))
        .transpose()?;

    let snapshot = controller.extract(document, limit).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Verify the requirement rows against supplier documents
#[utoipa::path(
    post,
    path = "/v1/workflow/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification completed", body = WorkflowSnapshot),
        (status = 400, description = "Missing documents or requirements", body = ErrorResponse),
        (status = 409, description = "Another operation is running", body = ErrorResponse),
        (status = 422, description = "No matches found", body = ErrorResponse),
        (status = 502, description = "Model API failure", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/verify")]
pub async fn verify(
    controller: web::Data<WorkflowController>,
    request: web::Json<VerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let documents = request
        .into_inner()
        .documents
        .into_iter()
        .map(|upload| UploadedDocument::from_upload(upload, DocumentRole::SupplierProposal))
        .collect::<Result<Vec<_>, _>>()?;

    let snapshot = controller.verify(documents).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Return to the extraction step, discarding all results
#[utoipa::path(
    post,
    path = "/v1/workflow/reset",
    responses(
        (status = 200, description = "Workflow reset", body = WorkflowSnapshot),
        (status = 500, description = "State storage failure", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/reset")]
pub async fn reset(controller: web::Data<WorkflowController>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(controller.reset()?))
}

/// Append an empty row
#[utoipa::path(
    post,
    path = "/v1/workflow/rows",
    responses(
        (status = 201, description = "Row added", body = RowCreated),
        (status = 400, description = "No result table yet", body = ErrorResponse),
        (status = 409, description = "Another operation is running", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/rows")]
pub async fn add_row(controller: web::Data<WorkflowController>) -> Result<HttpResponse, ApiError> {
    let id = controller.add_row()?;
    Ok(HttpResponse::Created().json(RowCreated { id }))
}

/// Edit one field of a row
#[utoipa::path(
    patch,
    path = "/v1/workflow/rows/{index}",
    params(
        ("index" = usize, Path, description = "Zero-based row position")
    ),
    request_body = EditRowRequest,
    responses(
        (status = 200, description = "Row updated", body = WorkflowSnapshot),
        (status = 400, description = "Field not editable or invalid value", body = ErrorResponse),
        (status = 404, description = "Row not found", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[patch("/v1/workflow/rows/{index}")]
pub async fn update_row(
    controller: web::Data<WorkflowController>,
    path: web::Path<usize>,
    request: web::Json<EditRowRequest>,
) -> Result<HttpResponse, ApiError> {
    let index = path.into_inner();
    let snapshot = controller.update_row(index, request.field, &request.value)?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Delete a row by id
#[utoipa::path(
    delete,
    path = "/v1/workflow/rows/{id}",
    params(
        ("id" = i64, Path, description = "Row id")
    ),
    responses(
        (status = 200, description = "Row deleted", body = WorkflowSnapshot),
        (status = 404, description = "Row not found", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[delete("/v1/workflow/rows/{id}")]
pub async fn delete_row(
    controller: web::Data<WorkflowController>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let snapshot = controller.delete_row(id)?;
    tracing::info!(id, "Row deleted");
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Rename a column of the result table
#[utoipa::path(
    post,
    path = "/v1/workflow/labels",
    request_body = LabelRequest,
    responses(
        (status = 200, description = "Column labels", body = ColumnLabels)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/labels")]
pub async fn rename_label(
    controller: web::Data<WorkflowController>,
    request: web::Json<LabelRequest>,
) -> HttpResponse {
    HttpResponse::Ok().json(controller.rename_label(request.field, &request.label))
}

/// Status counts and compliance rate of the verified rows
#[utoipa::path(
    get,
    path = "/v1/workflow/dashboard",
    responses(
        (status = 200, description = "Compliance statistics", body = ComplianceStats),
        (status = 400, description = "Verification has not completed", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[get("/v1/workflow/dashboard")]
pub async fn dashboard(controller: web::Data<WorkflowController>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(controller.dashboard()?))
}

/// Commercial conditions, highlighted and per supplier document
#[utoipa::path(
    get,
    path = "/v1/workflow/conditions",
    responses(
        (status = 200, description = "Condition summaries", body = ConditionsView),
        (status = 400, description = "Verification has not completed", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[get("/v1/workflow/conditions")]
pub async fn conditions(
    controller: web::Data<WorkflowController>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(controller.conditions()?))
}

/// Show a page, optionally switching supplier document
#[utoipa::path(
    post,
    path = "/v1/workflow/viewer/page",
    request_body = PageJumpRequest,
    responses(
        (status = 200, description = "Viewer state", body = ViewerState),
        (status = 400, description = "Invalid page or no documents", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/viewer/page")]
pub async fn page_jump(
    controller: web::Data<WorkflowController>,
    request: web::Json<PageJumpRequest>,
) -> Result<HttpResponse, ApiError> {
    let viewer = controller.page_jump(request.page, request.document_name.as_deref())?;
    Ok(HttpResponse::Ok().json(viewer))
}

/// Show a supplier document from its first page
#[utoipa::path(
    post,
    path = "/v1/workflow/viewer/documents/{index}",
    params(
        ("index" = usize, Path, description = "Zero-based document position")
    ),
    responses(
        (status = 200, description = "Viewer state", body = ViewerState),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[post("/v1/workflow/viewer/documents/{index}")]
pub async fn select_document(
    controller: web::Data<WorkflowController>,
    path: web::Path<usize>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(controller.select_document(path.into_inner())?))
}

/// Raw content of an uploaded supplier document
#[utoipa::path(
    get,
    path = "/v1/workflow/documents/{index}",
    params(
        ("index" = usize, Path, description = "Zero-based document position")
    ),
    responses(
        (status = 200, description = "Document content"),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[get("/v1/workflow/documents/{index}")]
pub async fn get_document(
    controller: web::Data<WorkflowController>,
    path: web::Path<usize>,
) -> Result<HttpResponse, ApiError> {
    let document = controller.document(path.into_inner())?;
    Ok(HttpResponse::Ok()
        .content_type(document.content_type().to_string())
        .insert_header((
            "Content-Disposition",
            format!("inline; filename=\"{}\"", document.name.replace('"', "")),
        ))
        .body(document.data.to_vec()))
}

/// Result table as CSV
#[utoipa::path(
    get,
    path = "/v1/workflow/export",
    responses(
        (status = 200, description = "CSV export", body = String, content_type = "text/csv"),
        (status = 400, description = "No results to export", body = ErrorResponse)
    ),
    tag = "workflow"
)]
#[get("/v1/workflow/export")]
pub async fn export_csv(controller: web::Data<WorkflowController>) -> Result<HttpResponse, ApiError> {
    let csv = controller.export_csv()?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
        ))
        .body(csv))
}

/// Configure workflow routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_workflow)
        .service(extract)
        .service(verify)
        .service(reset)
        .service(add_row)
        .service(update_row)
        .service(delete_row)
        .service(rename_label)
        .service(dashboard)
        .service(conditions)
        .service(page_jump)
        .service(select_document)
        .service(get_document)
        .service(export_csv);
}
