//! # Tenant Meter Submission Workflow
//!
//! Pure rules for mediating tenant-submitted readings into the meter
//! ledger. The database layer owns the transactions and the storage-level
//! uniqueness constraint; every decision lives here.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  tenant submits value ──► pending ──┬──► approved ──► MeterReading      │
//! │                                     │               (baseline = latest  │
//! │   rejected at submit when:          │                accepted reading,  │
//! │   • another pending submission      │                price = override   │
//! │     exists for (tenant, fee type)   │                ?? fee default)    │
//! │   • value < previous accepted       │                                   │
//! │                                     └──► rejected (reason required,     │
//! │                                          ledger untouched)              │
//! │                                                                         │
//! │  approved/rejected are terminal; re-reviewing is a conflict error,      │
//! │  never a silent no-op                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    FeeType, ReadingSource, SubmissionStatus, TenantMeterSubmission, UnitFeeOverride,
};
use chrono::NaiveDate;

// =============================================================================
// Submission Validation
// =============================================================================

/// Validates a new submission value against the latest accepted reading.
/// Meter values are monotonic.
pub fn validate_submission_value(submitted: i64, previous_accepted: i64) -> CoreResult<()> {
    if submitted < previous_accepted {
        return Err(ValidationError::ReadingBelowPrevious {
            previous: previous_accepted,
            submitted,
        }
        .into());
    }
    Ok(())
}

/// Guards approve/reject: only `pending` submissions may transition.
pub fn ensure_pending(
    submission: &TenantMeterSubmission,
    attempted: &'static str,
) -> CoreResult<()> {
    if submission.status != SubmissionStatus::Pending {
        return Err(CoreError::InvalidSubmissionTransition {
            submission_id: submission.id.clone(),
            current: submission.status,
            attempted,
        });
    }
    Ok(())
}

/// Approval requires the approver belong to the company that owns the unit.
pub fn ensure_same_company(record_company: &str, actor_company: &str) -> CoreResult<()> {
    if record_company != actor_company {
        return Err(CoreError::CompanyMismatch {
            record_company: record_company.to_string(),
            actor_company: actor_company.to_string(),
        });
    }
    Ok(())
}

/// Rejection requires a non-empty reason.
pub fn validate_rejection_reason(reason: &str) -> CoreResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "rejection_reason".to_string(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Price Resolution & Approval Draft
// =============================================================================

/// Resolves the effective unit price for a new reading: active override
/// price first, else the fee type default, else zero. The resolved price is
/// frozen onto the reading at creation time.
pub fn resolve_unit_price(fee_type: &FeeType, fee_override: Option<&UnitFeeOverride>) -> Money {
    fee_override
        .filter(|o| o.is_active)
        .and_then(|o| o.unit_price_minor)
        .map(Money::from_minor)
        .or_else(|| fee_type.default_unit_price())
        .unwrap_or_else(Money::zero)
}

/// Field set for a meter reading about to be inserted. The repository adds
/// the id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMeterReading {
    pub company_id: String,
    pub unit_id: String,
    pub fee_type_id: String,
    pub reading_date: NaiveDate,
    pub previous_value: i64,
    pub current_value: i64,
    pub unit_price_minor: i64,
    pub recorded_by: String,
    pub source: ReadingSource,
}

impl NewMeterReading {
    /// Consumption this reading will bill.
    #[inline]
    pub fn consumption(&self) -> i64 {
        self.current_value - self.previous_value
    }
}

/// Builds the reading an approval materializes.
///
/// `previous_accepted` is the latest accepted reading's current value for
/// the (unit, fee type), defaulting to 0 when none exists. Monotonicity is
/// re-checked here because the baseline may have moved between submission
/// and approval (e.g. a staff direct entry in between).
pub fn build_approved_reading(
    submission: &TenantMeterSubmission,
    previous_accepted: i64,
    unit_price: Money,
    approver: &str,
) -> CoreResult<NewMeterReading> {
    ensure_pending(submission, "approve")?;
    validate_submission_value(submission.submitted_value, previous_accepted)?;

    Ok(NewMeterReading {
        company_id: submission.company_id.clone(),
        unit_id: submission.unit_id.clone(),
        fee_type_id: submission.fee_type_id.clone(),
        reading_date: submission.reading_date,
        previous_value: previous_accepted,
        current_value: submission.submitted_value,
        unit_price_minor: unit_price.minor(),
        recorded_by: approver.to_string(),
        source: ReadingSource::Submission,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
