//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A rent ledger that drifts by one unit per month is a support ticket    │
//! │  every month, forever.                                                  │
//! │                                                                         │
//! │  OUR SOLUTION: integers in the smallest currency unit                   │
//! │    All charges, payments and balances are i64 minor units.             │
//! │    Division only happens in tax math, with explicit rounding.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use haven_core::money::Money;
//!
//! let rent = Money::from_minor(85_000);
//! let parking = Money::from_minor(12_000);
//! let subtotal = rent + parking;
//! assert_eq!(subtotal.minor(), 97_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative values for reversals and adjustments
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No float constructor**: amounts enter the system as integers and stay
///   integers; only display formatting ever leaves this representation
///
/// Every charge amount, payment, balance and unit price in the billing
/// pipeline flows through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (the smallest currency unit).
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Saturating subtraction clamped at zero.
    ///
    /// Used for display balances ("remaining to pay") where an overpaid
    /// billing must show zero remaining, never a negative figure.
    #[inline]
    pub const fn saturating_remaining(&self, paid: Money) -> Money {
        let rest = self.0 - paid.0;
        if rest < 0 {
            Money(0)
        } else {
            Money(rest)
        }
    }

    /// Calculates tax from a rate in basis points, rounding half up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`. The `+5000` provides
    /// the rounding (5000/10000 = 0.5). i128 intermediate prevents overflow
    /// on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use haven_core::money::Money;
    /// use haven_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_minor(97_000);
    /// let rate = TaxRate::from_bps(1000); // 10%
    /// assert_eq!(subtotal.calculate_tax(rate).minor(), 9_700);
    /// ```
    pub fn calculate_tax(&self, rate: crate::types::TaxRate) -> Money {
        let tax = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_minor(tax as i64)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use haven_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(500); // per m³
    /// let line_total = unit_price.multiply_quantity(50); // 50 m³ consumed
    /// assert_eq!(line_total.minor(), 25_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies a per-square-meter price by an area in centisquare-meters
    /// (hundredths of a m²), rounding half up.
    ///
    /// Areas are stored as integer hundredths so a 54.32 m² unit is
    /// `5432`. `price_per_sqm * area_csqm / 100` with `+50` for rounding.
    pub const fn multiply_area_csqm(&self, area_csqm: i64) -> Self {
        Money((self.0 * area_csqm + 50) / 100)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// For debugging and notification bodies. The portal frontends format
/// amounts themselves for localization.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}¥{}", sign, group_thousands(self.0.unsigned_abs()))
    }
}

/// Groups digits in threes: 1234567 -> "1,234,567".
fn group_thousands(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut groups: Vec<String> = Vec::new();
    while value > 0 {
        groups.push(format!("{:03}", value % 1000));
        value /= 1000;
    }
    let mut out = groups.pop().unwrap_or_default();
    // Strip leading zeros from the most significant group
    out = out.trim_start_matches('0').to_string();
    for g in groups.into_iter().rev() {
        out.push(',');
        out.push_str(&g);
    }
    out
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaxRate;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(85_000);
        assert_eq!(money.minor(), 85_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_minor(1_234_567)), "¥1,234,567");
        assert_eq!(format!("{}", Money::from_minor(500)), "¥500");
        assert_eq!(format!("{}", Money::from_minor(-5_500)), "-¥5,500");
        assert_eq!(format!("{}", Money::from_minor(0)), "¥0");
        assert_eq!(format!("{}", Money::from_minor(100_000)), "¥100,000");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);
    }

    #[test]
    fn test_tax_calculation() {
        // 97,000 at 10% = 9,700
        let subtotal = Money::from_minor(97_000);
        assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(1000)).minor(), 9_700);

        // 10,000 at 8.25% = 825
        let amount = Money::from_minor(10_000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).minor(), 825);

        // Rounding: 999 at 8.25% = 82.4175 -> 82
        assert_eq!(
            Money::from_minor(999).calculate_tax(TaxRate::from_bps(825)).minor(),
            82
        );
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_minor(500);
        assert_eq!(unit_price.multiply_quantity(50).minor(), 25_000);
    }

    #[test]
    fn test_multiply_area() {
        // 1,200 per m² on a 54.32 m² unit = 65,184
        let price = Money::from_minor(1_200);
        assert_eq!(price.multiply_area_csqm(5432).minor(), 65_184);

        // Rounding: 333 per m² on 0.50 m² = 166.5 -> 167
        assert_eq!(Money::from_minor(333).multiply_area_csqm(50).minor(), 167);
    }

    #[test]
    fn test_saturating_remaining() {
        let total = Money::from_minor(100_000);
        assert_eq!(total.saturating_remaining(Money::from_minor(40_000)).minor(), 60_000);
        // Overpayment clamps the *displayed* remainder at zero
        assert_eq!(total.saturating_remaining(Money::from_minor(120_000)).minor(), 0);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(Money::from_minor(100).is_positive());
        assert!(Money::from_minor(-100).is_negative());
        assert_eq!(Money::from_minor(-100).abs().minor(), 100);
    }
}
