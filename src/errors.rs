use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error payload returned by every handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Bad Request", "Service Unavailable")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Cannot check out: the cart is empty")]
    EmptyCart,

    #[error("Recipient profile is incomplete: first name, last name, patronymic and phone are required")]
    IncompleteProfile,

    #[error("Promo code not applicable: {0}")]
    PromoNotApplicable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Any acquiring API failure (HTTP error, timeout, malformed payload)
    // collapses into this one kind; the distinction lives in the logs only.
    #[error("Payment service temporarily unavailable")]
    GatewayUnavailable,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_)
            | Self::EmptyCart
            | Self::IncompleteProfile
            | Self::PromoNotApplicable(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Infrastructure errors return
    /// generic messages so provider and database internals never leak out.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::GatewayUnavailable => "Payment service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_map_to_bad_request() {
        assert_eq!(ServiceError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::IncompleteProfile.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PromoNotApplicable("below minimum".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn gateway_failure_is_service_unavailable_and_masked() {
        let err = ServiceError::GatewayUnavailable;
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.response_message(), "Payment service temporarily unavailable");
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = ServiceError::InternalError("connection pool exhausted".into());
        assert_eq!(err.response_message(), "Internal server error");
    }
}
