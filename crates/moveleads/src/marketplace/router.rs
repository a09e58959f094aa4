use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::assignments::{AssignmentError, AssignmentUpdate};
use super::domain::{AssignmentId, CompanyId, LeadId, LeadSubmission};
use super::intake::IntakeError;
use super::ledger::{CreditOutcome, LedgerError, PaymentCompleted};
use super::notifications::NotificationSink;
use super::pricing::PricingError;
use super::repository::{MarketplaceStore, RepositoryError};
use super::reveal::{RevealError, RevealRequest};
use super::service::Marketplace;

pub const CLIENT_KEY_HEADER: &str = "x-client-key";
const ANONYMOUS_CLIENT: &str = "anonymous";

type Shared<S, N> = State<Arc<Marketplace<S, N>>>;

/// Company- and homeowner-facing endpoints. The `:company_id` segment is the identity the
/// authentication layer in front of this router has already verified.
pub fn marketplace_router<S, N>(marketplace: Arc<Marketplace<S, N>>) -> Router
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(submit_lead_handler::<S, N>))
        .route(
            "/api/v1/companies/:company_id/assignments",
            get(list_assignments_handler::<S, N>),
        )
        .route(
            "/api/v1/companies/:company_id/assignments/:assignment_id",
            patch(update_assignment_handler::<S, N>),
        )
        .route(
            "/api/v1/companies/:company_id/assignments/:assignment_id/reveal",
            post(reveal_handler::<S, N>),
        )
        .route(
            "/api/v1/companies/:company_id/credits",
            get(credits_handler::<S, N>),
        )
        .route(
            "/api/v1/payments/checkout-completed",
            post(checkout_completed_handler::<S, N>),
        )
        .with_state(marketplace)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RevealBody {
    lead_id: String,
}

fn error_body(status: StatusCode, message: impl ToString) -> Response {
    let payload = json!({ "error": message.to_string() });
    (status, Json(payload)).into_response()
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict | RepositoryError::StaleLedgerHead(_) => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) async fn submit_lead_handler<S, N>(
    State(marketplace): Shared<S, N>,
    headers: HeaderMap,
    Json(submission): Json<LeadSubmission>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let client_key = headers
        .get(CLIENT_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT);

    match marketplace.intake.submit(client_key, submission, Utc::now()) {
        Ok(receipt) => {
            let payload = json!({
                "lead_id": receipt.lead_id,
                "matched": receipt.assignments.len(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(IntakeError::RateLimited(limited)) => {
            let payload = json!({
                "error": limited.to_string(),
                "retry_after_secs": limited.retry_after_secs,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(payload)).into_response()
        }
        Err(IntakeError::Repository(error)) => error_body(repository_status(&error), error),
    }
}

pub(crate) async fn reveal_handler<S, N>(
    State(marketplace): Shared<S, N>,
    Path((company_id, assignment_id)): Path<(String, String)>,
    Json(body): Json<RevealBody>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let request = RevealRequest {
        lead_id: LeadId(body.lead_id),
        assignment_id: AssignmentId(assignment_id),
        requesting_company_id: CompanyId(company_id),
    };

    match marketplace.reveal.reveal(&request, Utc::now()) {
        Ok(outcome) => {
            let payload = json!({
                "assignment_id": outcome.assignment.id,
                "lead_id": outcome.assignment.lead_id,
                "status": outcome.assignment.status.label(),
                "price": outcome.assignment.price_at_reveal,
                "charged": outcome.charged,
                "contact": outcome.contact,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(RevealError::NotFound)
        | Err(RevealError::Pricing(PricingError::LeadNotFound(_))) => {
            error_body(StatusCode::NOT_FOUND, "assignment not found")
        }
        Err(RevealError::InsufficientCredits { required, balance }) => {
            let payload = json!({
                "error": "insufficient credits",
                "required": required,
                "balance": balance,
            });
            (StatusCode::PAYMENT_REQUIRED, Json(payload)).into_response()
        }
        Err(RevealError::AssignmentUpdateFailed { refunded, .. }) => {
            let message = if refunded {
                "reveal could not be recorded, credits have been refunded"
            } else {
                "reveal could not be recorded, refund is pending review"
            };
            let payload = json!({ "error": message, "refunded": refunded });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(RevealError::ContactUnavailable(_)) => error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "lead paid for, contact details temporarily unavailable; retry without charge",
        ),
        Err(RevealError::Ledger(LedgerError::Contention(_))) => error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "credit balance is busy, try again",
        ),
        Err(other) => error_body(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}

pub(crate) async fn update_assignment_handler<S, N>(
    State(marketplace): Shared<S, N>,
    Path((company_id, assignment_id)): Path<(String, String)>,
    Json(update): Json<AssignmentUpdate>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let company_id = CompanyId(company_id);
    let assignment_id = AssignmentId(assignment_id);

    match marketplace
        .assignments
        .update(&company_id, &assignment_id, update)
    {
        Ok(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        Err(AssignmentError::NotFound) => error_body(StatusCode::NOT_FOUND, "assignment not found"),
        Err(error @ AssignmentError::NotRevealed) => error_body(StatusCode::CONFLICT, error),
        Err(error @ AssignmentError::InvalidTransition { .. }) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, error)
        }
        Err(AssignmentError::Repository(error)) => error_body(repository_status(&error), error),
    }
}

pub(crate) async fn list_assignments_handler<S, N>(
    State(marketplace): Shared<S, N>,
    Path(company_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match marketplace
        .assignments
        .list_for_company(&CompanyId(company_id))
    {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(other) => error_body(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}

pub(crate) async fn credits_handler<S, N>(
    State(marketplace): Shared<S, N>,
    Path(company_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    let company_id = CompanyId(company_id);
    let ledger = &marketplace.ledger;

    let summary = ledger
        .history(&company_id)
        .and_then(|entries| Ok((ledger.current_balance(&company_id)?, entries)));

    match summary {
        Ok((balance, entries)) => {
            let payload = json!({
                "company_id": company_id,
                "balance": balance,
                "low_credit_threshold": ledger.low_credit_threshold(),
                "entries": entries,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(other) => error_body(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}

pub(crate) async fn checkout_completed_handler<S, N>(
    State(marketplace): Shared<S, N>,
    Json(payment): Json<PaymentCompleted>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    match marketplace.ledger.credit_purchase(&payment, Utc::now()) {
        Ok(CreditOutcome::Applied(entry)) => {
            let payload = json!({
                "status": "applied",
                "entry_id": entry.id,
                "balance": entry.balance_after,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(CreditOutcome::AlreadyProcessed(_)) => {
            (StatusCode::OK, Json(json!({ "status": "already_processed" }))).into_response()
        }
        Err(error @ LedgerError::InvalidAmount(_)) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, error)
        }
        Err(other) => error_body(StatusCode::INTERNAL_SERVER_ERROR, other),
    }
}
