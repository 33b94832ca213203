use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::catalog::VerifyError;
use crate::db::StoreError;
use crate::messaging::PublishError;

// ============================================================================
// Order Workflow Errors
// ============================================================================
//
// One variant per failing step of the create workflow, plus NotFound for
// reads. Callers always get a stable generic message; the underlying cause
// stays in the logs.
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("product verification failed")]
    ProductUnavailable(#[source] VerifyError),

    #[error("order storage failed")]
    Storage(#[source] StoreError),

    #[error("event publish failed after commit")]
    Publish(#[source] PublishError),

    #[error("order not found")]
    NotFound,
}

impl OrderError {
    /// Message HTTP callers see. Deliberately coarser than the error itself:
    /// every verification failure reads the same, and storage/publish detail
    /// never leaves the process.
    fn public_message(&self) -> &str {
        match self {
            OrderError::InvalidInput(message) => message,
            OrderError::ProductUnavailable(_) => "product not found",
            OrderError::Storage(_) | OrderError::Publish(_) => "internal error",
            OrderError::NotFound => "order not found",
        }
    }
}

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OrderError::ProductUnavailable(_) => StatusCode::NOT_FOUND,
            OrderError::Storage(_) | OrderError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrderError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.public_message() }))
    }
}
