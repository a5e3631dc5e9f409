//! # Validation Module
//!
//! Input validation utilities shared by the API layer and the batch jobs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API handler (deserialization + THIS MODULE)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business rules (billing/metering state machines)              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (NOT NULL, UNIQUE, FK, partial unique indexes)       │
//! │                                                                         │
//! │  Defense in depth: different layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a billing month in `YYYY-MM` form.
///
/// ## Example
/// ```rust
/// use haven_core::validation::validate_billing_month;
///
/// assert!(validate_billing_month("2026-03").is_ok());
/// assert!(validate_billing_month("2026-3").is_err());
/// assert!(validate_billing_month("2026-13").is_err());
/// ```
pub fn validate_billing_month(month: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: "billing_month".to_string(),
        reason: "expected YYYY-MM".to_string(),
    };

    let (year, month_part) = month.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month_part.len() != 2 {
        return Err(invalid());
    }
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    match month_part.parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validates a monetary amount that must be strictly positive.
pub fn validate_positive_amount(amount_minor: i64, field: &str) -> ValidationResult<()> {
    if amount_minor <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a display name (fee names, announcement titles).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 200 characters
pub fn validate_name(name: &str, field: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_month() {
        assert!(validate_billing_month("2026-01").is_ok());
        assert!(validate_billing_month("2026-12").is_ok());

        assert!(validate_billing_month("2026-00").is_err());
        assert!(validate_billing_month("2026-13").is_err());
        assert!(validate_billing_month("2026-3").is_err());
        assert!(validate_billing_month("26-03").is_err());
        assert!(validate_billing_month("202603").is_err());
        assert!(validate_billing_month("").is_err());
    }

    #[test]
    fn test_positive_amount() {
        assert!(validate_positive_amount(1, "amount").is_ok());
        assert!(validate_positive_amount(0, "amount").is_err());
        assert!(validate_positive_amount(-100, "amount").is_err());
    }

    #[test]
    fn test_name() {
        assert!(validate_name("Rent", "name").is_ok());
        assert!(validate_name("", "name").is_err());
        assert!(validate_name("   ", "name").is_err());
        assert!(validate_name(&"x".repeat(201), "name").is_err());
    }
}
