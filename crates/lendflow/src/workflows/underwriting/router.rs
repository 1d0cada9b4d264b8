use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::links::LinkAction;

use super::domain::{
    ConditionsSubmission, IntakeForm, LoanId, ValuationFields, ValuationSource, WorkflowError,
};
use super::orchestrator::LenderDecision;
use super::repository::{
    DocumentStore, LoanRepository, NotificationDispatcher, ValuationProvider,
};
use super::service::{LoanWorkflowService, NewLoanApplication};

type Service<R, D, N, V> = Arc<LoanWorkflowService<R, D, N, V>>;

/// Router builder exposing the loan workflow over HTTP.
pub fn loan_router<R, D, N, V>(service: Service<R, D, N, V>) -> Router
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    Router::new()
        .route("/api/v1/loans", post(submit_handler::<R, D, N, V>))
        .route("/api/v1/loans/:loan_id", get(status_handler::<R, D, N, V>))
        .route(
            "/api/v1/loans/:loan_id/events",
            post(event_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/decision",
            post(decision_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/intake",
            post(intake_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/conditions",
            post(conditions_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/summary",
            get(summary_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/prefill",
            get(prefill_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/valuation",
            post(valuation_handler::<R, D, N, V>),
        )
        .route(
            "/api/v1/loans/:loan_id/actions/:action",
            get(action_handler::<R, D, N, V>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Json(submission): Json<NewLoanApplication>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let loan = service.submit_application(submission)?;
    Ok((StatusCode::CREATED, Json(loan)).into_response())
}

pub(crate) async fn status_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let view = service.status(&LoanId(loan_id))?;
    Ok((StatusCode::OK, Json(view)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRequest {
    event: String,
}

pub(crate) async fn event_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
    Json(request): Json<EventRequest>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let outcome = service.advance_workflow_event(&LoanId(loan_id), &request.event)?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    decision: String,
    #[serde(default)]
    notes: Option<String>,
}

pub(crate) async fn decision_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let Some(decision) = LenderDecision::parse(&request.decision) else {
        return Err(AppError::Service(
            WorkflowError::ValidationFailed {
                violations: vec![format!("unknown lender decision {}", request.decision)],
            }
            .into(),
        ));
    };
    let outcome = service.apply_lender_decision(&LoanId(loan_id), decision, request.notes)?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn intake_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
    Json(form): Json<IntakeForm>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let outcome = service.submit_underwriting_intake(&LoanId(loan_id), form)?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn conditions_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
    Json(submission): Json<ConditionsSubmission>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let outcome = service.submit_conditions_form(&LoanId(loan_id), submission)?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn summary_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let summary = service.decision_summary(&LoanId(loan_id))?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

pub(crate) async fn prefill_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let snapshot = service.prefill(&LoanId(loan_id))?;
    Ok((StatusCode::OK, Json(snapshot)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValuationRequest {
    source: ValuationSource,
    #[serde(default)]
    fields: Option<ValuationFields>,
}

pub(crate) async fn valuation_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path(loan_id): Path<String>,
    Json(request): Json<ValuationRequest>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let (loan, view) =
        service.update_valuation_input(&LoanId(loan_id), request.source, request.fields)?;
    Ok((
        StatusCode::OK,
        Json(json!({ "loan": loan, "valuation": view })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionQuery {
    expires: i64,
    sig: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    index: Option<usize>,
}

/// Signed one-click links from lender emails. Approve and deny apply the
/// corresponding lender decision once the signature checks out; the rest
/// only confirm the link is genuine.
pub(crate) async fn action_handler<R, D, N, V>(
    State(service): State<Service<R, D, N, V>>,
    Path((loan_id, action)): Path<(String, String)>,
    Query(query): Query<ActionQuery>,
) -> Result<Response, AppError>
where
    R: LoanRepository + 'static,
    D: DocumentStore + 'static,
    N: NotificationDispatcher + 'static,
    V: ValuationProvider + 'static,
{
    let id = LoanId(loan_id);
    let Some(action) = LinkAction::parse(&action) else {
        return Err(AppError::Service(WorkflowError::Unauthorized.into()));
    };
    let Some(expires_at) = DateTime::<Utc>::from_timestamp(query.expires, 0) else {
        return Err(AppError::Service(WorkflowError::Unauthorized.into()));
    };

    match action {
        LinkAction::DocumentPreview => {
            let (Some(group), Some(index)) = (query.group.as_deref(), query.index) else {
                return Err(AppError::Service(WorkflowError::Unauthorized.into()));
            };
            service.verify_document_preview(&id, group, index, expires_at, &query.sig)?;
            Ok((StatusCode::OK, Json(json!({ "verified": true }))).into_response())
        }
        LinkAction::Approve => {
            service.verify_email_action(&id, action, expires_at, &query.sig)?;
            let outcome = service.apply_lender_decision(&id, LenderDecision::PreApprove, None)?;
            Ok((StatusCode::OK, Json(outcome)).into_response())
        }
        LinkAction::Deny => {
            service.verify_email_action(&id, action, expires_at, &query.sig)?;
            let outcome = service.apply_lender_decision(&id, LenderDecision::Decline, None)?;
            Ok((StatusCode::OK, Json(outcome)).into_response())
        }
        LinkAction::Comment | LinkAction::Message => {
            service.verify_email_action(&id, action, expires_at, &query.sig)?;
            Ok((StatusCode::OK, Json(json!({ "verified": true }))).into_response())
        }
    }
}
