use actix_web::HttpResponse;

use crate::store_repository::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    /// Requested change does not apply to the current state
    #[error("{0}")]
    Conflict(String),

    #[error("Payment gateway unavailable")]
    PaymentUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn into_response(self, operation: &str) -> HttpResponse {
        match self {
            ServiceError::Invalid(reason) => HttpResponse::BadRequest().json(reason),
            ServiceError::Unauthorized => HttpResponse::Unauthorized().finish(),
            ServiceError::Forbidden(reason) => HttpResponse::Forbidden().json(reason),
            ServiceError::Conflict(reason) => HttpResponse::Conflict().json(reason),
            ServiceError::PaymentUnavailable => {
                tracing::warn!("{} failed, payment gateway unavailable", operation);
                HttpResponse::ServiceUnavailable().json(self.to_string())
            }
            ServiceError::Store(
                StoreError::UserNotFound(_)
                | StoreError::OrderNotFound(_)
                | StoreError::SettlementNotFound(_)
                | StoreError::TicketNotFound(_)
                | StoreError::NotificationNotFound(_),
            ) => HttpResponse::NotFound().finish(),
            ServiceError::Store(
                err @ (StoreError::EmailTaken(_)
                | StoreError::OrderChanged(_)
                | StoreError::SettlementAlreadyDecided(_)
                | StoreError::TicketClosed(_)),
            ) => HttpResponse::Conflict().json(err.to_string()),
            ServiceError::Store(err @ StoreError::InsufficientFunds { .. }) => {
                HttpResponse::PaymentRequired().json(err.to_string())
            }
            err => {
                tracing::error!("{} failed {:#}", operation, err);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}
