//! # Billing Status State Machine
//!
//! Pure transition functions for a billing's payment status. The database
//! layer reads a billing, calls into here, and persists the result under a
//! compare-and-swap guard; no status decision is ever made in SQL.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   pending ──────┬──► partial ──────┬──► paid                            │
//! │      │          │       ▲          │                                    │
//! │      │          │       │          │                                    │
//! │      ├──────────┴──► overdue ──────┘   (payment can cure overdue back   │
//! │      │                  │               to partial/paid, but status     │
//! │      │                  │               never reverts to pending once   │
//! │      ▼                  ▼               money has been applied)         │
//! │  cancelled ◄────────────┘                                               │
//! │  (terminal; blocked once paid)                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The due-date comparison is re-evaluated at every mutation: a partial
//! payment against a billing whose due date has passed lands on `overdue`,
//! not `partial`, whether or not the sweep has already run.

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::BillingStatus;

// =============================================================================
// Transition Outcome
// =============================================================================

/// Result of applying or removing a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// The new stored paid amount (not clamped on overpayment).
    pub new_paid: Money,

    /// The new billing status.
    pub new_status: BillingStatus,

    /// True when the new paid amount exceeds the total. Tolerated by
    /// design; callers log a warning, never reject.
    pub overpaid: bool,
}

/// Status for a given coverage level, with the due date re-evaluated.
fn status_for(paid: Money, total: Money, due_date: NaiveDate, today: NaiveDate) -> BillingStatus {
    if paid >= total {
        BillingStatus::Paid
    } else if due_date < today {
        BillingStatus::Overdue
    } else if paid.is_positive() {
        BillingStatus::Partial
    } else {
        BillingStatus::Pending
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// Applies a payment: `paid' = paid + amount`, status recomputed from the
/// new coverage and the due date.
///
/// ## Errors
/// - `ValidationError::MustBePositive` for a non-positive amount
/// - `InvalidBillingTransition` when the billing is cancelled
pub fn apply_payment(
    billing_id: &str,
    status: BillingStatus,
    paid: Money,
    total: Money,
    amount: Money,
    due_date: NaiveDate,
    today: NaiveDate,
) -> CoreResult<PaymentOutcome> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into());
    }
    if status == BillingStatus::Cancelled {
        return Err(CoreError::InvalidBillingTransition {
            billing_id: billing_id.to_string(),
            current: status,
            attempted: "apply a payment",
        });
    }

    let new_paid = paid + amount;

    Ok(PaymentOutcome {
        new_paid,
        new_status: status_for(new_paid, total, due_date, today),
        overpaid: new_paid > total,
    })
}

/// Reverses a payment: `paid' = max(0, paid - amount)`, status recomputed.
///
/// Removal down to zero returns the billing to `pending` only when the due
/// date is still in the future; past-due it lands on `overdue`.
pub fn remove_payment(
    billing_id: &str,
    status: BillingStatus,
    paid: Money,
    total: Money,
    amount: Money,
    due_date: NaiveDate,
    today: NaiveDate,
) -> CoreResult<PaymentOutcome> {
    if status == BillingStatus::Cancelled {
        return Err(CoreError::InvalidBillingTransition {
            billing_id: billing_id.to_string(),
            current: status,
            attempted: "remove a payment",
        });
    }

    let raw = paid - amount;
    let new_paid = if raw.is_negative() { Money::zero() } else { raw };

    Ok(PaymentOutcome {
        new_paid,
        new_status: status_for(new_paid, total, due_date, today),
        overpaid: new_paid > total,
    })
}

/// The overdue sweep transition for one billing.
///
/// Returns `Some(Overdue)` when a `pending`/`partial` billing's due date
/// has passed, `None` otherwise. Re-running on an already-overdue billing
/// is a no-op, which makes the sweep idempotent.
pub fn sweep_status(
    status: BillingStatus,
    due_date: NaiveDate,
    today: NaiveDate,
) -> Option<BillingStatus> {
    match status {
        BillingStatus::Pending | BillingStatus::Partial if due_date < today => {
            Some(BillingStatus::Overdue)
        }
        _ => None,
    }
}

/// Cancels a billing. One-way, and blocked once fully paid.
pub fn cancel(billing_id: &str, status: BillingStatus) -> CoreResult<BillingStatus> {
    match status {
        BillingStatus::Pending | BillingStatus::Partial | BillingStatus::Overdue => {
            Ok(BillingStatus::Cancelled)
        }
        BillingStatus::Paid | BillingStatus::Cancelled => {
            Err(CoreError::InvalidBillingTransition {
                billing_id: billing_id.to_string(),
                current: status,
                attempted: "cancel",
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
