//! # Error Types
//!
//! Domain-specific error types for haven-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  haven-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations (incl. conflicts)      │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  haven-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  haven-api errors (in app)                                              │
//! │  └── ApiError         - What callers see (HTTP status + JSON body)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (current status, ids)
//! 3. Errors are enum variants, never String
//! 4. Conflict errors always carry the current state so the caller can
//!    correct the request

use thiserror::Error;

use crate::types::{BillingStatus, SubmissionStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Validation variants are rejected immediately and never retried;
/// conflict variants surface an invalid state transition together with the
/// current state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The billing is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Applying a payment to a cancelled billing
    /// - Cancelling a paid (or already cancelled) billing
    #[error("Billing {billing_id} is {current:?}, cannot {attempted}")]
    InvalidBillingTransition {
        billing_id: String,
        current: BillingStatus,
        attempted: &'static str,
    },

    /// The submission is not `pending`.
    ///
    /// Approving or rejecting a reviewed submission is rejected explicitly,
    /// never silently ignored.
    #[error("Submission {submission_id} is {current:?}, cannot {attempted}")]
    InvalidSubmissionTransition {
        submission_id: String,
        current: SubmissionStatus,
        attempted: &'static str,
    },

    /// Another `pending` submission already exists for this (tenant, fee type).
    #[error("Tenant {tenant_id} already has a pending submission for fee type {fee_type_id}")]
    DuplicatePendingSubmission {
        tenant_id: String,
        fee_type_id: String,
    },

    /// The acting identity belongs to a different company than the record.
    #[error("Record belongs to company {record_company}, not {actor_company}")]
    CompanyMismatch {
        record_company: String,
        actor_company: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for invalid-state-transition errors (HTTP 409 territory).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidBillingTransition { .. }
                | CoreError::InvalidSubmissionTransition { .. }
                | CoreError::DuplicatePendingSubmission { .. }
                | CoreError::CompanyMismatch { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when input doesn't meet requirements and are caught before
/// any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid billing month, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A meter value below the accepted baseline. Meter values are
    /// monotonic; this is rejected at submit and at write time.
    #[error("reading {submitted} is below the previous accepted reading {previous}")]
    ReadingBelowPrevious { previous: i64, submitted: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidBillingTransition {
            billing_id: "b-1".to_string(),
            current: BillingStatus::Paid,
            attempted: "cancel",
        };
        assert_eq!(err.to_string(), "Billing b-1 is Paid, cannot cancel");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "reason".to_string(),
        };
        assert_eq!(err.to_string(), "reason is required");

        let err = ValidationError::ReadingBelowPrevious {
            previous: 150,
            submitted: 120,
        };
        assert_eq!(
            err.to_string(),
            "reading 120 is below the previous accepted reading 150"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert!(!core_err.is_conflict());
    }
}
