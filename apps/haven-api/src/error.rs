//! Error types for the API layer.
//!
//! `ApiError` is what callers see: an HTTP status plus a JSON body. Library
//! errors map in via `From` impls so handlers use `?` throughout. Conflict
//! responses carry the current-state detail from the underlying error, so a
//! caller can correct the request without a second round trip.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use haven_core::CoreError;
use haven_db::DbError;
use haven_jobs::JobsError;

/// API errors, one variant per HTTP outcome.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400: the request is malformed or violates a validation rule.
    #[error("{0}")]
    Validation(String),

    /// 401: missing or wrong scheduler token / identity header.
    #[error("{0}")]
    Unauthorized(String),

    /// 404
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// 409: the record is not in a state that allows the operation.
    #[error("{0}")]
    Conflict(String),

    /// 500
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal detail goes to the log, never to the caller
        if let ApiError::Internal(detail) = &self {
            error!(detail = %detail, "Internal API error");
        }

        let message = match &self {
            ApiError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (self.status(), body).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ApiError::Conflict(err.to_string())
            }
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if err.is_conflict() {
            ApiError::Conflict(err.to_string())
        } else {
            ApiError::Validation(err.to_string())
        }
    }
}

impl From<JobsError> for ApiError {
    fn from(err: JobsError) -> Self {
        match err {
            JobsError::Db(db) => db.into(),
            JobsError::Core(core) => core.into(),
            JobsError::InvalidParameter(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{BillingStatus, ValidationError};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("Billing", "b-1").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("busy".into()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_core_error_split() {
        let conflict = CoreError::InvalidBillingTransition {
            billing_id: "b-1".into(),
            current: BillingStatus::Cancelled,
            attempted: "apply a payment",
        };
        assert!(matches!(ApiError::from(conflict), ApiError::Conflict(_)));

        let validation: CoreError = ValidationError::MustBePositive {
            field: "amount".into(),
        }
        .into();
        assert!(matches!(ApiError::from(validation), ApiError::Validation(_)));
    }

    #[test]
    fn test_db_not_found_maps_to_404() {
        let err = DbError::not_found("Payment", "p-1");
        assert!(matches!(ApiError::from(err), ApiError::NotFound { .. }));
    }
}
