//! # Fee Repository
//!
//! Database operations for fee types and per-unit overrides.
//!
//! ## Price Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  active unit_fee_override value                                         │
//! │       │ (absent or inactive)                                            │
//! │       ▼                                                                 │
//! │  fee_types default value                                                │
//! │       │ (absent)                                                        │
//! │       ▼                                                                 │
//! │  zero / line item omitted (kind-dependent, decided in haven-core)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use haven_core::{FeeKind, FeeType, UnitFeeOverride};

/// Repository for fee type and override operations.
#[derive(Debug, Clone)]
pub struct FeeRepository {
    pool: SqlitePool,
}

impl FeeRepository {
    /// Creates a new FeeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FeeRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Fee Types
    // -------------------------------------------------------------------------

    /// Creates a fee type.
    pub async fn create_fee_type(
        &self,
        company_id: &str,
        name: &str,
        kind: FeeKind,
        default_amount_minor: Option<i64>,
        default_unit_price_minor: Option<i64>,
        display_order: i64,
    ) -> DbResult<FeeType> {
        let now = Utc::now();
        let fee_type = FeeType {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            name: name.to_string(),
            kind,
            default_amount_minor,
            default_unit_price_minor,
            is_active: true,
            display_order,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %fee_type.id, name = %fee_type.name, kind = ?kind, "Creating fee type");

        sqlx::query(
            r#"
            INSERT INTO fee_types (
                id, company_id, name, kind,
                default_amount_minor, default_unit_price_minor,
                is_active, display_order, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&fee_type.id)
        .bind(&fee_type.company_id)
        .bind(&fee_type.name)
        .bind(fee_type.kind)
        .bind(fee_type.default_amount_minor)
        .bind(fee_type.default_unit_price_minor)
        .bind(fee_type.is_active)
        .bind(fee_type.display_order)
        .bind(fee_type.created_at)
        .bind(fee_type.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(fee_type)
    }

    /// Gets a fee type by ID.
    pub async fn get_fee_type(&self, id: &str) -> DbResult<Option<FeeType>> {
        let fee_type = sqlx::query_as::<_, FeeType>("SELECT * FROM fee_types WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(fee_type)
    }

    /// Lists active fee types for a company in display order.
    ///
    /// Issuance iterates exactly this list; inactive fee types never
    /// produce line items.
    pub async fn list_active_for_company(&self, company_id: &str) -> DbResult<Vec<FeeType>> {
        let fee_types = sqlx::query_as::<_, FeeType>(
            r#"
            SELECT * FROM fee_types
            WHERE company_id = ?1 AND is_active = 1
            ORDER BY display_order, name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(fee_types)
    }

    /// Updates a fee type's default pricing.
    ///
    /// Existing billings and meter readings are unaffected: their amounts
    /// and unit prices were frozen at creation.
    pub async fn update_defaults(
        &self,
        id: &str,
        default_amount_minor: Option<i64>,
        default_unit_price_minor: Option<i64>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE fee_types SET
                default_amount_minor = ?2,
                default_unit_price_minor = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(default_amount_minor)
        .bind(default_unit_price_minor)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FeeType", id));
        }

        Ok(())
    }

    /// Activates or deactivates a fee type.
    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE fee_types SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FeeType", id));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Unit Fee Overrides
    // -------------------------------------------------------------------------

    /// Creates or replaces the override for a (unit, fee type) pair.
    pub async fn upsert_override(
        &self,
        unit_id: &str,
        fee_type_id: &str,
        amount_minor: Option<i64>,
        unit_price_minor: Option<i64>,
        is_active: bool,
    ) -> DbResult<UnitFeeOverride> {
        let fee_override = UnitFeeOverride {
            id: Uuid::new_v4().to_string(),
            unit_id: unit_id.to_string(),
            fee_type_id: fee_type_id.to_string(),
            amount_minor,
            unit_price_minor,
            is_active,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO unit_fee_overrides (
                id, unit_id, fee_type_id, amount_minor, unit_price_minor,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (unit_id, fee_type_id) DO UPDATE SET
                amount_minor = excluded.amount_minor,
                unit_price_minor = excluded.unit_price_minor,
                is_active = excluded.is_active
            "#,
        )
        .bind(&fee_override.id)
        .bind(&fee_override.unit_id)
        .bind(&fee_override.fee_type_id)
        .bind(fee_override.amount_minor)
        .bind(fee_override.unit_price_minor)
        .bind(fee_override.is_active)
        .bind(fee_override.created_at)
        .execute(&self.pool)
        .await?;

        // Re-read: an upsert over an existing row keeps the original id
        let stored = self
            .get_override(unit_id, fee_type_id)
            .await?
            .ok_or_else(|| DbError::not_found("UnitFeeOverride", unit_id))?;

        Ok(stored)
    }

    /// Gets the override for a (unit, fee type) pair, active or not.
    pub async fn get_override(
        &self,
        unit_id: &str,
        fee_type_id: &str,
    ) -> DbResult<Option<UnitFeeOverride>> {
        let fee_override = sqlx::query_as::<_, UnitFeeOverride>(
            "SELECT * FROM unit_fee_overrides WHERE unit_id = ?1 AND fee_type_id = ?2",
        )
        .bind(unit_id)
        .bind(fee_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fee_override)
    }

    /// Lists all overrides for a unit.
    pub async fn list_overrides_for_unit(&self, unit_id: &str) -> DbResult<Vec<UnitFeeOverride>> {
        let overrides = sqlx::query_as::<_, UnitFeeOverride>(
            "SELECT * FROM unit_fee_overrides WHERE unit_id = ?1",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(overrides)
    }
}
