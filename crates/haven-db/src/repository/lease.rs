//! # Lease Repository
//!
//! Database operations for leases. Issuance and the lease-expiry trigger
//! both scan from here.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use haven_core::{Lease, LeaseStatus};

/// Repository for lease database operations.
#[derive(Debug, Clone)]
pub struct LeaseRepository {
    pool: SqlitePool,
}

impl LeaseRepository {
    /// Creates a new LeaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LeaseRepository { pool }
    }

    /// Creates an active lease.
    pub async fn create_lease(
        &self,
        company_id: &str,
        unit_id: &str,
        tenant_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DbResult<Lease> {
        let lease = Lease {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            unit_id: unit_id.to_string(),
            tenant_id: tenant_id.to_string(),
            start_date,
            end_date,
            status: LeaseStatus::Active,
            created_at: Utc::now(),
        };

        debug!(id = %lease.id, unit_id = %unit_id, "Creating lease");

        sqlx::query(
            r#"
            INSERT INTO leases (
                id, company_id, unit_id, tenant_id,
                start_date, end_date, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&lease.id)
        .bind(&lease.company_id)
        .bind(&lease.unit_id)
        .bind(&lease.tenant_id)
        .bind(lease.start_date)
        .bind(lease.end_date)
        .bind(lease.status)
        .bind(lease.created_at)
        .execute(&self.pool)
        .await?;

        Ok(lease)
    }

    /// Gets a lease by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Lease>> {
        let lease = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lease)
    }

    /// Lists all active leases for a company. Monthly issuance scans this.
    pub async fn list_active_for_company(&self, company_id: &str) -> DbResult<Vec<Lease>> {
        let leases = sqlx::query_as::<_, Lease>(
            r#"
            SELECT * FROM leases
            WHERE company_id = ?1 AND status = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(leases)
    }

    /// Lists active leases ending exactly on the given date.
    ///
    /// The lease-expiry trigger calls this once per configured window
    /// (today + 30, + 14, + 7 days).
    pub async fn active_ending_on(&self, end_date: NaiveDate) -> DbResult<Vec<Lease>> {
        let leases = sqlx::query_as::<_, Lease>(
            r#"
            SELECT * FROM leases
            WHERE status = 'active' AND end_date = ?1
            ORDER BY created_at
            "#,
        )
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(leases)
    }

    /// Flips active leases whose end date has passed to `expired`.
    ///
    /// Returns the number of leases expired. Idempotent.
    pub async fn expire_ended(&self, today: NaiveDate) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE leases SET status = 'expired'
            WHERE status = 'active' AND end_date < ?1
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
