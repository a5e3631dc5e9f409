//! # Domain Types
//!
//! Core domain types used throughout Haven PMS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    FeeType      │   │    Billing      │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  kind           │   │  billing_month  │   │  billing_id(FK) │       │
//! │  │  default_amount │   │  status         │   │  method         │       │
//! │  │  unit_price     │   │  total/paid     │   │  amount_minor   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌───────────────┐    │
//! │  │  MeterReading   │   │TenantMeterSubmission │   │     Lease     │    │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ───────────  │    │
//! │  │  prev/current   │   │  pending             │   │  active       │    │
//! │  │  frozen price   │   │  → approved/rejected │   │  start/end    │    │
//! │  └─────────────────┘   └──────────────────────┘   └───────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business identity: (lease + billing month, unit + fee type, ...) -
//!   human-meaningful, enforced with unique indexes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10% (consumption tax on service fees)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Company / Unit / Tenant
// =============================================================================

/// A property-management company (the top-level tenant of the SaaS).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Company {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Consumption tax applied to billing subtotals, in basis points.
    pub tax_rate_bps: i64,

    /// When the company was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Returns the company tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps.max(0) as u32)
    }
}

/// A rentable unit (room/apartment) owned by a company.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Unit {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// Display name, e.g. "203" or "B-1F East".
    pub name: String,

    /// Floor area in centisquare-meters (hundredths of a m²).
    /// `None` when the floor plan has not been measured; per-m² fees
    /// compute to zero for such units.
    pub area_csqm: Option<i64>,

    /// When the unit was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A person renting a unit. Contact fields drive notification delivery:
/// a missing email/phone makes that channel a `skipped` outcome.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tenant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// Display name.
    pub name: String,

    /// Email address for the email channel.
    pub email: Option<String>,

    /// Phone number for the SMS channel.
    pub phone: Option<String>,

    /// When the tenant was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Lease
// =============================================================================

/// The status of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    /// Lease is in force; billings are issued monthly.
    Active,
    /// Lease was ended early by either party.
    Terminated,
    /// Lease reached its end date.
    Expired,
}

/// A tenancy: one tenant occupying one unit for a date range.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Lease {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// The occupied unit.
    pub unit_id: String,

    /// The occupying tenant.
    pub tenant_id: String,

    /// First day of the tenancy.
    #[ts(as = "String")]
    pub start_date: NaiveDate,

    /// Last day of the tenancy.
    #[ts(as = "String")]
    pub end_date: NaiveDate,

    /// Current status.
    pub status: LeaseStatus,

    /// When the lease record was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Fee Types & Overrides
// =============================================================================

/// How a fee type's line-item amount is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    /// Flat amount per month (rent, parking).
    Fixed,
    /// Unit price × floor area (common-area maintenance).
    PerSqm,
    /// Unit price × metered consumption (water, gas, electricity).
    Metered,
    /// Manually entered amount (one-off repairs, key money).
    Custom,
}

/// A billable category owned by a company.
///
/// Soft-deactivated via `is_active`, never hard-deleted once referenced by
/// a billing: historical line items keep pointing at it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FeeType {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// Display name, e.g. "家賃" / "Rent".
    pub name: String,

    /// Calculation kind.
    pub kind: FeeKind,

    /// Default charge for `fixed` (and fallback for `custom`) kinds.
    pub default_amount_minor: Option<i64>,

    /// Default unit price for `per_sqm` / `metered` kinds.
    pub default_unit_price_minor: Option<i64>,

    /// Soft-delete flag; inactive fee types are excluded from issuance.
    pub is_active: bool,

    /// Sort order on billing documents.
    pub display_order: i64,

    /// When the fee type was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the fee type was last edited.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl FeeType {
    /// Default amount as Money, if configured.
    #[inline]
    pub fn default_amount(&self) -> Option<Money> {
        self.default_amount_minor.map(Money::from_minor)
    }

    /// Default unit price as Money, if configured.
    #[inline]
    pub fn default_unit_price(&self) -> Option<Money> {
        self.default_unit_price_minor.map(Money::from_minor)
    }
}

/// Per-unit customization of a fee type's amount or unit price.
///
/// Unique per (unit, fee type). Takes precedence over the fee type's
/// defaults when present and active.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UnitFeeOverride {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The unit this override applies to.
    pub unit_id: String,

    /// The fee type being overridden.
    pub fee_type_id: String,

    /// Overriding amount (for fixed/custom kinds).
    pub amount_minor: Option<i64>,

    /// Overriding unit price (for per_sqm/metered kinds).
    pub unit_price_minor: Option<i64>,

    /// Independent active flag; an inactive override is ignored.
    pub is_active: bool,

    /// When the override was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Meter Readings
// =============================================================================

/// How an accepted meter reading entered the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Direct entry by company staff.
    Staff,
    /// Approval of a tenant submission.
    Submission,
}

/// An accepted, immutable meter measurement.
///
/// ## Invariants
/// - `current_value >= previous_value` (enforced at write time)
/// - `unit_price_minor` is frozen at creation; later fee-type price edits
///   never change historical bills
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MeterReading {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// The metered unit.
    pub unit_id: String,

    /// The metered fee type (water, gas, ...).
    pub fee_type_id: String,

    /// Date the meter was read.
    #[ts(as = "String")]
    pub reading_date: NaiveDate,

    /// Previous accepted meter value (baseline).
    pub previous_value: i64,

    /// Current meter value.
    pub current_value: i64,

    /// Unit price frozen at creation time.
    pub unit_price_minor: i64,

    /// Identity that recorded the reading (staff user or approver).
    pub recorded_by: String,

    /// How the reading entered the ledger.
    pub source: ReadingSource,

    /// When the reading was recorded.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl MeterReading {
    /// Consumption for the period: current − previous.
    #[inline]
    pub fn consumption(&self) -> i64 {
        self.current_value - self.previous_value
    }

    /// The frozen unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.unit_price_minor)
    }
}

// =============================================================================
// Tenant Meter Submissions
// =============================================================================

/// Workflow state of a tenant-submitted reading.
///
/// `pending → approved | rejected`, terminal and one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Awaiting company review.
    Pending,
    /// Materialized into a MeterReading.
    Approved,
    /// Declined with a reason; ledger untouched.
    Rejected,
}

/// A tenant-proposed meter reading awaiting company approval.
///
/// At most one `pending` submission exists per (tenant, fee type) at a
/// time — enforced with a partial unique index at the storage layer, not
/// just application logic, so concurrent submissions cannot race past the
/// check.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TenantMeterSubmission {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company (denormalized for the approval ownership check).
    pub company_id: String,

    /// Submitting tenant.
    pub tenant_id: String,

    /// The metered unit.
    pub unit_id: String,

    /// The metered fee type.
    pub fee_type_id: String,

    /// The claimed current meter value.
    pub submitted_value: i64,

    /// Date the tenant read the meter.
    #[ts(as = "String")]
    pub reading_date: NaiveDate,

    /// Optional free-text note from the tenant.
    pub note: Option<String>,

    /// Workflow state.
    pub status: SubmissionStatus,

    /// Required when rejected.
    pub rejection_reason: Option<String>,

    /// Staff identity that approved/rejected.
    pub reviewed_by: Option<String>,

    /// When the review happened.
    #[ts(as = "String")]
    pub reviewed_at: Option<DateTime<Utc>>,

    /// Back-reference to the MeterReading created on approval.
    pub meter_reading_id: Option<String>,

    /// When the submission was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Billing
// =============================================================================

/// Payment status of a billing document. See the transition rules in
/// [`crate::billing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    /// Issued, no money applied yet.
    Pending,
    /// Some money applied, not fully covered, due date not passed.
    Partial,
    /// Fully covered.
    Paid,
    /// Due date passed without full coverage.
    Overdue,
    /// Cancelled before full payment. Terminal.
    Cancelled,
}

impl BillingStatus {
    /// Statuses that still expect money (targets of the overdue sweep).
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            BillingStatus::Pending | BillingStatus::Partial | BillingStatus::Overdue
        )
    }
}

/// A monthly charge document for one (tenant, unit).
///
/// `paid_minor <= total_minor` is the target but overpayment is tolerated
/// (logged, never rejected); the stored figure keeps the true sum and only
/// the displayed remainder is clamped.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Billing {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// Billed tenant.
    pub tenant_id: String,

    /// Billed unit.
    pub unit_id: String,

    /// The lease this billing was issued under.
    pub lease_id: String,

    /// Billing month in `YYYY-MM` form. Unique per lease.
    pub billing_month: String,

    /// Date the billing was issued.
    #[ts(as = "String")]
    pub issue_date: NaiveDate,

    /// Date payment is due.
    #[ts(as = "String")]
    pub due_date: NaiveDate,

    /// Sum of line-item amounts.
    pub subtotal_minor: i64,

    /// Tax on the subtotal.
    pub tax_minor: i64,

    /// subtotal + tax.
    pub total_minor: i64,

    /// Sum of applied payments (not clamped on overpayment).
    pub paid_minor: i64,

    /// Payment status.
    pub status: BillingStatus,

    /// When the billing was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the billing was last mutated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Billing {
    /// Total amount as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_minor)
    }

    /// Paid amount as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_minor(self.paid_minor)
    }

    /// Remaining balance for display, clamped at zero on overpayment.
    #[inline]
    pub fn remaining(&self) -> Money {
        self.total().saturating_remaining(self.paid())
    }
}

/// A computed line on a billing. Owned exclusively by one billing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BillingItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning billing.
    pub billing_id: String,

    /// Source fee type, if any (manual lines have none).
    pub fee_type_id: Option<String>,

    /// Fee name snapshot — preserved even if the fee type is later renamed.
    pub name: String,

    /// Quantity (1 for fixed, consumption for metered, area for per-m²).
    pub quantity: i64,

    /// Unit price snapshot, when the kind has one.
    pub unit_price_minor: Option<i64>,

    /// Line amount.
    pub amount_minor: i64,

    /// Free-text description.
    pub description: Option<String>,

    /// When the item was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payments
// =============================================================================

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer (the usual case).
    BankTransfer,
    /// Cash at the office.
    Cash,
    /// Card via an external gateway.
    Card,
    /// Anything else.
    Other,
}

/// Confirmation state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Confirmed; counted toward the billing's paid amount.
    Completed,
    /// Tenant-claimed, awaiting staff confirmation; not yet counted.
    Pending,
}

/// A monetary application against a billing.
///
/// Deleting a payment reverses its effect on the owning billing's paid
/// amount and recomputes status.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning billing.
    pub billing_id: String,

    /// Paid amount.
    pub amount_minor: i64,

    /// Date the money arrived.
    #[ts(as = "String")]
    pub paid_on: NaiveDate,

    /// Payment method.
    pub method: PaymentMethod,

    /// Confirmation state.
    pub status: PaymentStatus,

    /// When the payment record was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor)
    }
}

/// A billing together with its line items and payments, as returned by the
/// read interface.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillingDetails {
    pub billing: Billing,
    pub items: Vec<BillingItem>,
    pub payments: Vec<Payment>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate() {
        let rate = TaxRate::from_bps(1000);
        assert_eq!(rate.bps(), 1000);
        assert_eq!(rate.percentage(), 10.0);
        assert!(TaxRate::zero().is_zero());
    }

    #[test]
    fn test_billing_status_is_open() {
        assert!(BillingStatus::Pending.is_open());
        assert!(BillingStatus::Partial.is_open());
        assert!(BillingStatus::Overdue.is_open());
        assert!(!BillingStatus::Paid.is_open());
        assert!(!BillingStatus::Cancelled.is_open());
    }

    #[test]
    fn test_reading_consumption() {
        let reading = MeterReading {
            id: "r1".into(),
            company_id: "c1".into(),
            unit_id: "u1".into(),
            fee_type_id: "f1".into(),
            reading_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            previous_value: 100,
            current_value: 150,
            unit_price_minor: 500,
            recorded_by: "staff-1".into(),
            source: ReadingSource::Staff,
            created_at: Utc::now(),
        };
        assert_eq!(reading.consumption(), 50);
        assert_eq!(reading.unit_price().minor(), 500);
    }

    #[test]
    fn test_billing_remaining_clamps_overpayment() {
        let billing = Billing {
            id: "b1".into(),
            company_id: "c1".into(),
            tenant_id: "t1".into(),
            unit_id: "u1".into(),
            lease_id: "l1".into(),
            billing_month: "2026-02".into(),
            issue_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            subtotal_minor: 100_000,
            tax_minor: 0,
            total_minor: 100_000,
            paid_minor: 120_000,
            status: BillingStatus::Paid,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        // Stored figure keeps the true sum; only display clamps
        assert_eq!(billing.paid_minor, 120_000);
        assert_eq!(billing.remaining().minor(), 0);
    }
}
