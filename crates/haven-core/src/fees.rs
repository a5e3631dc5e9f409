//! # Fee Calculator
//!
//! Pure function layer converting a fee-type definition plus context into a
//! monetary line-item amount. No I/O, fully deterministic: the same inputs
//! always produce the same amount.
//!
//! ## Calculation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kind      │ amount                                                     │
//! │  ──────────┼─────────────────────────────────────────────────────────── │
//! │  fixed     │ active override amount ?? default amount ?? 0              │
//! │  per_sqm   │ 0 if unit area unknown,                                    │
//! │            │ else area × (active override price ?? default price ?? 0)  │
//! │  metered   │ 0 if no reading for the period,                            │
//! │            │ else consumption × reading's FROZEN unit price             │
//! │  custom    │ active override amount ?? 0 (never inferred)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The metered unit price is the one frozen on the MeterReading at creation
//! time — historical bills must not change if a fee type's default price is
//! edited later.

use crate::money::Money;
use crate::types::{FeeKind, FeeType, MeterReading, TaxRate, UnitFeeOverride};

// =============================================================================
// Context
// =============================================================================

/// Everything the calculator may need besides the fee type itself.
///
/// Assembled by the billing aggregator from the unit record, the override
/// table and the meter reading ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeContext<'a> {
    /// The per-unit override for this (unit, fee type), if one exists.
    pub fee_override: Option<&'a UnitFeeOverride>,

    /// Unit floor area in centisquare-meters, if known.
    pub area_csqm: Option<i64>,

    /// The accepted meter reading for the billing period, if any.
    pub reading: Option<&'a MeterReading>,
}

impl<'a> FeeContext<'a> {
    /// The override, but only when it is active. Inactive overrides are
    /// ignored entirely.
    fn active_override(&self) -> Option<&'a UnitFeeOverride> {
        self.fee_override.filter(|o| o.is_active)
    }

    /// Effective override amount (fixed/custom kinds).
    fn override_amount(&self) -> Option<Money> {
        self.active_override()
            .and_then(|o| o.amount_minor)
            .map(Money::from_minor)
    }

    /// Effective override unit price (per_sqm kind).
    fn override_unit_price(&self) -> Option<Money> {
        self.active_override()
            .and_then(|o| o.unit_price_minor)
            .map(Money::from_minor)
    }
}

// =============================================================================
// Amount Computation
// =============================================================================

/// Computes the line-item amount for one fee type. Pure.
pub fn compute_amount(fee_type: &FeeType, ctx: &FeeContext) -> Money {
    match fee_type.kind {
        FeeKind::Fixed => ctx
            .override_amount()
            .or_else(|| fee_type.default_amount())
            .unwrap_or_else(Money::zero),

        FeeKind::PerSqm => match ctx.area_csqm {
            // Unknown area produces no charge, not an error
            None => Money::zero(),
            Some(area_csqm) => {
                let price = ctx
                    .override_unit_price()
                    .or_else(|| fee_type.default_unit_price())
                    .unwrap_or_else(Money::zero);
                price.multiply_area_csqm(area_csqm)
            }
        },

        FeeKind::Metered => match ctx.reading {
            // No reading for the period produces no charge
            None => Money::zero(),
            // Price is frozen on the reading, never re-resolved here
            Some(reading) => reading.unit_price().multiply_quantity(reading.consumption()),
        },

        // Manual entry only; the calculator never infers custom amounts
        FeeKind::Custom => ctx.override_amount().unwrap_or_else(Money::zero),
    }
}

// =============================================================================
// Line Items & Totals
// =============================================================================

/// A computed line item draft, before it is persisted onto a billing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    /// Source fee type.
    pub fee_type_id: Option<String>,

    /// Fee name snapshot.
    pub name: String,

    /// Quantity: 1 for fixed/custom, consumption for metered, area in
    /// centisquare-meters for per-m² fees.
    pub quantity: i64,

    /// Unit price snapshot, when the kind has one.
    pub unit_price_minor: Option<i64>,

    /// Line amount.
    pub amount: Money,

    /// Free-text description.
    pub description: Option<String>,
}

/// Builds the line-item draft for one fee type.
///
/// Zero-amount lines for metered fees without a reading (or per-m² fees on
/// unmeasured units) are still returned; the aggregator decides whether to
/// keep or drop them.
pub fn build_line_item(fee_type: &FeeType, ctx: &FeeContext) -> LineItem {
    let amount = compute_amount(fee_type, ctx);

    let (quantity, unit_price_minor) = match fee_type.kind {
        FeeKind::Fixed | FeeKind::Custom => (1, None),
        FeeKind::PerSqm => {
            let price = ctx
                .override_unit_price()
                .or_else(|| fee_type.default_unit_price())
                .unwrap_or_else(Money::zero);
            (ctx.area_csqm.unwrap_or(0), Some(price.minor()))
        }
        FeeKind::Metered => match ctx.reading {
            Some(r) => (r.consumption(), Some(r.unit_price_minor)),
            None => (0, None),
        },
    };

    LineItem {
        fee_type_id: Some(fee_type.id.clone()),
        name: fee_type.name.clone(),
        quantity,
        unit_price_minor,
        amount,
        description: None,
    }
}

/// Billing document totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// Sums line items and applies the company tax rate.
///
/// Amounts are integers in the base currency unit; no rounding happens
/// beyond the tax computation itself.
pub fn billing_totals(items: &[LineItem], tax_rate: TaxRate) -> BillingTotals {
    let subtotal = items
        .iter()
        .fold(Money::zero(), |acc, item| acc + item.amount);
    let tax = subtotal.calculate_tax(tax_rate);

    BillingTotals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingSource;
    use chrono::{NaiveDate, Utc};

    fn fee(kind: FeeKind, amount: Option<i64>, unit_price: Option<i64>) -> FeeType {
        FeeType {
            id: "fee-1".into(),
            company_id: "c-1".into(),
            name: "Water".into(),
            kind,
            default_amount_minor: amount,
            default_unit_price_minor: unit_price,
            is_active: true,
            display_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fee_override(amount: Option<i64>, unit_price: Option<i64>, active: bool) -> UnitFeeOverride {
        UnitFeeOverride {
            id: "ov-1".into(),
            unit_id: "u-1".into(),
            fee_type_id: "fee-1".into(),
            amount_minor: amount,
            unit_price_minor: unit_price,
            is_active: active,
            created_at: Utc::now(),
        }
    }

    fn reading(previous: i64, current: i64, unit_price: i64) -> MeterReading {
        MeterReading {
            id: "r-1".into(),
            company_id: "c-1".into(),
            unit_id: "u-1".into(),
            fee_type_id: "fee-1".into(),
            reading_date: NaiveDate::from_ymd_opt(2026, 2, 15).unwrap(),
            previous_value: previous,
            current_value: current,
            unit_price_minor: unit_price,
            recorded_by: "staff-1".into(),
            source: ReadingSource::Staff,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fixed_uses_default_amount() {
        let fee = fee(FeeKind::Fixed, Some(85_000), None);
        let amount = compute_amount(&fee, &FeeContext::default());
        assert_eq!(amount.minor(), 85_000);
    }

    #[test]
    fn test_fixed_override_precedence() {
        let fee = fee(FeeKind::Fixed, Some(85_000), None);
        let ov = fee_override(Some(80_000), None, true);
        let ctx = FeeContext {
            fee_override: Some(&ov),
            ..Default::default()
        };
        assert_eq!(compute_amount(&fee, &ctx).minor(), 80_000);
    }

    #[test]
    fn test_inactive_override_is_ignored() {
        let fee = fee(FeeKind::Fixed, Some(85_000), None);
        let ov = fee_override(Some(80_000), None, false);
        let ctx = FeeContext {
            fee_override: Some(&ov),
            ..Default::default()
        };
        assert_eq!(compute_amount(&fee, &ctx).minor(), 85_000);
    }

    #[test]
    fn test_fixed_without_any_amount_is_zero() {
        let fee = fee(FeeKind::Fixed, None, None);
        assert_eq!(compute_amount(&fee, &FeeContext::default()).minor(), 0);
    }

    #[test]
    fn test_per_sqm_unknown_area_is_zero() {
        let fee = fee(FeeKind::PerSqm, None, Some(1_200));
        assert_eq!(compute_amount(&fee, &FeeContext::default()).minor(), 0);
    }

    #[test]
    fn test_per_sqm_uses_area() {
        let fee = fee(FeeKind::PerSqm, None, Some(1_200));
        let ctx = FeeContext {
            area_csqm: Some(5432), // 54.32 m²
            ..Default::default()
        };
        assert_eq!(compute_amount(&fee, &ctx).minor(), 65_184);
    }

    #[test]
    fn test_per_sqm_override_unit_price() {
        let fee = fee(FeeKind::PerSqm, None, Some(1_200));
        let ov = fee_override(None, Some(1_000), true);
        let ctx = FeeContext {
            fee_override: Some(&ov),
            area_csqm: Some(5000), // 50 m²
            ..Default::default()
        };
        assert_eq!(compute_amount(&fee, &ctx).minor(), 50_000);
    }

    #[test]
    fn test_metered_without_reading_is_zero() {
        let fee = fee(FeeKind::Metered, None, Some(500));
        assert_eq!(compute_amount(&fee, &FeeContext::default()).minor(), 0);
    }

    /// The frozen-price scenario: previous=100, current=150, price frozen at
    /// 500 → 25,000, unaffected by a later default price change.
    #[test]
    fn test_metered_price_is_frozen_on_reading() {
        let mut fee = fee(FeeKind::Metered, None, Some(500));
        let r = reading(100, 150, 500);
        let ctx = FeeContext {
            reading: Some(&r),
            ..Default::default()
        };
        assert_eq!(compute_amount(&fee, &ctx).minor(), 25_000);

        // Later price edit on the fee type must not change the result
        fee.default_unit_price_minor = Some(9_999);
        assert_eq!(compute_amount(&fee, &ctx).minor(), 25_000);
    }

    #[test]
    fn test_custom_never_inferred() {
        let fee = fee(FeeKind::Custom, Some(30_000), None);
        // Without an override, a custom fee charges nothing even though a
        // default amount is configured
        assert_eq!(compute_amount(&fee, &FeeContext::default()).minor(), 0);

        let ov = fee_override(Some(30_000), None, true);
        let ctx = FeeContext {
            fee_override: Some(&ov),
            ..Default::default()
        };
        assert_eq!(compute_amount(&fee, &ctx).minor(), 30_000);
    }

    #[test]
    fn test_compute_amount_is_pure() {
        let fee = fee(FeeKind::Metered, None, Some(500));
        let r = reading(100, 150, 500);
        let ctx = FeeContext {
            reading: Some(&r),
            ..Default::default()
        };
        // Identical inputs yield identical output
        assert_eq!(compute_amount(&fee, &ctx), compute_amount(&fee, &ctx));
    }

    #[test]
    fn test_build_line_item_metered() {
        let fee = fee(FeeKind::Metered, None, Some(500));
        let r = reading(100, 150, 500);
        let ctx = FeeContext {
            reading: Some(&r),
            ..Default::default()
        };
        let item = build_line_item(&fee, &ctx);
        assert_eq!(item.quantity, 50);
        assert_eq!(item.unit_price_minor, Some(500));
        assert_eq!(item.amount.minor(), 25_000);
        assert_eq!(item.name, "Water");
    }

    #[test]
    fn test_billing_totals() {
        let fee_rent = fee(FeeKind::Fixed, Some(85_000), None);
        let fee_water = fee(FeeKind::Metered, None, Some(500));
        let r = reading(100, 150, 500);

        let items = vec![
            build_line_item(&fee_rent, &FeeContext::default()),
            build_line_item(
                &fee_water,
                &FeeContext {
                    reading: Some(&r),
                    ..Default::default()
                },
            ),
        ];

        let totals = billing_totals(&items, TaxRate::from_bps(1000));
        assert_eq!(totals.subtotal.minor(), 110_000);
        assert_eq!(totals.tax.minor(), 11_000);
        assert_eq!(totals.total.minor(), 121_000);
    }
}
