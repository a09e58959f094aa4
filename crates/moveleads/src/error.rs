use crate::config::ConfigError;
use crate::marketplace::{
    AssignmentError, CompanyError, IntakeError, LedgerError, PricingError, RepositoryError,
    RevealError,
};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Repository(RepositoryError),
    Ledger(LedgerError),
    Pricing(PricingError),
    Intake(IntakeError),
    Reveal(RevealError),
    Assignment(AssignmentError),
    Company(CompanyError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Repository(err) => write!(f, "storage error: {}", err),
            AppError::Ledger(err) => write!(f, "ledger error: {}", err),
            AppError::Pricing(err) => write!(f, "pricing error: {}", err),
            AppError::Intake(err) => write!(f, "lead intake error: {}", err),
            AppError::Reveal(err) => write!(f, "reveal error: {}", err),
            AppError::Assignment(err) => write!(f, "assignment error: {}", err),
            AppError::Company(err) => write!(f, "company error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::Ledger(err) => Some(err),
            AppError::Pricing(err) => Some(err),
            AppError::Intake(err) => Some(err),
            AppError::Reveal(err) => Some(err),
            AppError::Assignment(err) => Some(err),
            AppError::Company(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Intake(IntakeError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Reveal(RevealError::InsufficientCredits { .. })
            | AppError::Ledger(LedgerError::InsufficientCredits { .. }) => {
                StatusCode::PAYMENT_REQUIRED
            }
            AppError::Reveal(RevealError::NotFound)
            | AppError::Assignment(AssignmentError::NotFound)
            | AppError::Company(CompanyError::NotFound)
            | AppError::Pricing(PricingError::LeadNotFound(_))
            | AppError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Reveal(RevealError::AssignmentUpdateFailed { .. })
            | AppError::Assignment(AssignmentError::NotRevealed)
            | AppError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            AppError::Ledger(LedgerError::InvalidAmount(_))
            | AppError::Assignment(AssignmentError::InvalidTransition { .. })
            | AppError::Company(CompanyError::MissingField(_))
            | AppError::Company(CompanyError::InvalidDecision) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<PricingError> for AppError {
    fn from(value: PricingError) -> Self {
        Self::Pricing(value)
    }
}

impl From<IntakeError> for AppError {
    fn from(value: IntakeError) -> Self {
        Self::Intake(value)
    }
}

impl From<RevealError> for AppError {
    fn from(value: RevealError) -> Self {
        Self::Reveal(value)
    }
}

impl From<AssignmentError> for AppError {
    fn from(value: AssignmentError) -> Self {
        Self::Assignment(value)
    }
}

impl From<CompanyError> for AppError {
    fn from(value: CompanyError) -> Self {
        Self::Company(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn insufficient_credits_maps_to_payment_required() {
        let err = AppError::from(RevealError::InsufficientCredits {
            required: Decimal::new(1200, 2),
            balance: Decimal::new(300, 2),
        });
        assert_eq!(err.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn configuration_failures_are_internal() {
        let err = AppError::from(ConfigError::InvalidPort);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
