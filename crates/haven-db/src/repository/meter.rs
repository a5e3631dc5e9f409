//! # Meter Repository
//!
//! Database operations for meter readings and tenant meter submissions.
//!
//! ## Approval Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  approve_submission(sub, reading)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    INSERT meter_readings (frozen unit price, source = 'submission')     │
//! │    UPDATE tenant_meter_submissions                                      │
//! │        SET status = 'approved', meter_reading_id = ...                  │
//! │        WHERE id = ? AND status = 'pending'   ← CAS guard                │
//! │    rows_affected == 0 → ROLLBACK (already reviewed) → Conflict          │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use haven_core::metering::NewMeterReading;
use haven_core::{MeterReading, SubmissionStatus, TenantMeterSubmission};

/// Repository for meter reading and submission operations.
#[derive(Debug, Clone)]
pub struct MeterRepository {
    pool: SqlitePool,
}

impl MeterRepository {
    /// Creates a new MeterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MeterRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Readings
    // -------------------------------------------------------------------------

    /// Inserts a meter reading (staff direct entry path).
    pub async fn insert_reading(&self, new: &NewMeterReading) -> DbResult<MeterReading> {
        let reading = MeterReading {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id.clone(),
            unit_id: new.unit_id.clone(),
            fee_type_id: new.fee_type_id.clone(),
            reading_date: new.reading_date,
            previous_value: new.previous_value,
            current_value: new.current_value,
            unit_price_minor: new.unit_price_minor,
            recorded_by: new.recorded_by.clone(),
            source: new.source,
            created_at: Utc::now(),
        };

        debug!(
            id = %reading.id,
            unit_id = %reading.unit_id,
            consumption = reading.current_value - reading.previous_value,
            "Inserting meter reading"
        );

        self.insert_reading_row(&self.pool, &reading).await?;

        Ok(reading)
    }

    async fn insert_reading_row<'e, E>(&self, executor: E, reading: &MeterReading) -> DbResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO meter_readings (
                id, company_id, unit_id, fee_type_id, reading_date,
                previous_value, current_value, unit_price_minor,
                recorded_by, source, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&reading.id)
        .bind(&reading.company_id)
        .bind(&reading.unit_id)
        .bind(&reading.fee_type_id)
        .bind(reading.reading_date)
        .bind(reading.previous_value)
        .bind(reading.current_value)
        .bind(reading.unit_price_minor)
        .bind(&reading.recorded_by)
        .bind(reading.source)
        .bind(reading.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Gets a reading by ID.
    pub async fn get_reading(&self, id: &str) -> DbResult<Option<MeterReading>> {
        let reading =
            sqlx::query_as::<_, MeterReading>("SELECT * FROM meter_readings WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(reading)
    }

    /// Latest accepted meter value for a (unit, fee type), or 0 when the
    /// meter has no history. This is the monotonicity baseline.
    pub async fn latest_accepted_value(&self, unit_id: &str, fee_type_id: &str) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT current_value FROM meter_readings
            WHERE unit_id = ?1 AND fee_type_id = ?2
            ORDER BY reading_date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(unit_id)
        .bind(fee_type_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.unwrap_or(0))
    }

    /// Latest reading whose reading date falls inside the given billing
    /// month (`YYYY-MM`). Issuance bills this reading's consumption; a month
    /// with no reading produces no line item for the metered fee.
    pub async fn latest_reading_in_month(
        &self,
        unit_id: &str,
        fee_type_id: &str,
        billing_month: &str,
    ) -> DbResult<Option<MeterReading>> {
        let reading = sqlx::query_as::<_, MeterReading>(
            r#"
            SELECT * FROM meter_readings
            WHERE unit_id = ?1 AND fee_type_id = ?2
              AND substr(reading_date, 1, 7) = ?3
            ORDER BY reading_date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(unit_id)
        .bind(fee_type_id)
        .bind(billing_month)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reading)
    }

    /// Full reading history for a unit, newest first.
    pub async fn list_readings_for_unit(&self, unit_id: &str) -> DbResult<Vec<MeterReading>> {
        let readings = sqlx::query_as::<_, MeterReading>(
            r#"
            SELECT * FROM meter_readings
            WHERE unit_id = ?1
            ORDER BY reading_date DESC, created_at DESC
            "#,
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    // -------------------------------------------------------------------------
    // Submissions
    // -------------------------------------------------------------------------

    /// Creates a pending submission.
    ///
    /// The partial unique index on (tenant_id, fee_type_id) WHERE pending
    /// rejects a second in-flight submission; that surfaces here as
    /// [`DbError::UniqueViolation`].
    pub async fn create_submission(
        &self,
        company_id: &str,
        tenant_id: &str,
        unit_id: &str,
        fee_type_id: &str,
        submitted_value: i64,
        reading_date: NaiveDate,
        note: Option<&str>,
    ) -> DbResult<TenantMeterSubmission> {
        let submission = TenantMeterSubmission {
            id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            tenant_id: tenant_id.to_string(),
            unit_id: unit_id.to_string(),
            fee_type_id: fee_type_id.to_string(),
            submitted_value,
            reading_date,
            note: note.map(str::to_string),
            status: SubmissionStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            meter_reading_id: None,
            created_at: Utc::now(),
        };

        debug!(
            id = %submission.id,
            tenant_id = %tenant_id,
            value = submitted_value,
            "Creating meter submission"
        );

        sqlx::query(
            r#"
            INSERT INTO tenant_meter_submissions (
                id, company_id, tenant_id, unit_id, fee_type_id,
                submitted_value, reading_date, note, status,
                rejection_reason, reviewed_by, reviewed_at,
                meter_reading_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&submission.id)
        .bind(&submission.company_id)
        .bind(&submission.tenant_id)
        .bind(&submission.unit_id)
        .bind(&submission.fee_type_id)
        .bind(submission.submitted_value)
        .bind(submission.reading_date)
        .bind(&submission.note)
        .bind(submission.status)
        .bind(&submission.rejection_reason)
        .bind(&submission.reviewed_by)
        .bind(submission.reviewed_at)
        .bind(&submission.meter_reading_id)
        .bind(submission.created_at)
        .execute(&self.pool)
        .await?;

        Ok(submission)
    }

    /// Gets a submission by ID.
    pub async fn get_submission(&self, id: &str) -> DbResult<Option<TenantMeterSubmission>> {
        let submission = sqlx::query_as::<_, TenantMeterSubmission>(
            "SELECT * FROM tenant_meter_submissions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    /// Lists pending submissions for a company, oldest first.
    pub async fn list_pending_for_company(
        &self,
        company_id: &str,
    ) -> DbResult<Vec<TenantMeterSubmission>> {
        let submissions = sqlx::query_as::<_, TenantMeterSubmission>(
            r#"
            SELECT * FROM tenant_meter_submissions
            WHERE company_id = ?1 AND status = 'pending'
            ORDER BY created_at
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    /// Approves a pending submission, materializing the meter reading in
    /// the same transaction.
    ///
    /// Returns the created reading. Fails with [`DbError::Conflict`] when
    /// the submission left `pending` between load and update.
    pub async fn approve_submission(
        &self,
        submission_id: &str,
        new_reading: &NewMeterReading,
        reviewer: &str,
    ) -> DbResult<MeterReading> {
        let now = Utc::now();
        let reading = MeterReading {
            id: Uuid::new_v4().to_string(),
            company_id: new_reading.company_id.clone(),
            unit_id: new_reading.unit_id.clone(),
            fee_type_id: new_reading.fee_type_id.clone(),
            reading_date: new_reading.reading_date,
            previous_value: new_reading.previous_value,
            current_value: new_reading.current_value,
            unit_price_minor: new_reading.unit_price_minor,
            recorded_by: new_reading.recorded_by.clone(),
            source: new_reading.source,
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;

        self.insert_reading_row(&mut *tx, &reading).await?;

        let result = sqlx::query(
            r#"
            UPDATE tenant_meter_submissions SET
                status = 'approved',
                reviewed_by = ?2,
                reviewed_at = ?3,
                meter_reading_id = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(submission_id)
        .bind(reviewer)
        .bind(now)
        .bind(&reading.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::conflict(format!(
                "submission {submission_id} is no longer pending"
            )));
        }

        tx.commit().await?;

        debug!(
            submission_id = %submission_id,
            reading_id = %reading.id,
            "Submission approved"
        );

        Ok(reading)
    }

    /// Rejects a pending submission with a reason. The meter ledger is
    /// untouched.
    pub async fn reject_submission(
        &self,
        submission_id: &str,
        reason: &str,
        reviewer: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_meter_submissions SET
                status = 'rejected',
                rejection_reason = ?2,
                reviewed_by = ?3,
                reviewed_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(submission_id)
        .bind(reason)
        .bind(reviewer)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!(
                "submission {submission_id} is no longer pending"
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{date, fixture, Fixture};
    use haven_core::ReadingSource;

    async fn submit(fx: &Fixture, value: i64) -> DbResult<TenantMeterSubmission> {
        fx.db
            .meters()
            .create_submission(
                &fx.company.id,
                &fx.tenant.id,
                &fx.unit.id,
                &fx.water.id,
                value,
                date(2026, 2, 28),
                None,
            )
            .await
    }

    fn reading_draft(fx: &Fixture, previous: i64, current: i64) -> NewMeterReading {
        NewMeterReading {
            company_id: fx.company.id.clone(),
            unit_id: fx.unit.id.clone(),
            fee_type_id: fx.water.id.clone(),
            reading_date: date(2026, 2, 28),
            previous_value: previous,
            current_value: current,
            unit_price_minor: 500,
            recorded_by: "staff-1".to_string(),
            source: ReadingSource::Submission,
        }
    }

    #[tokio::test]
    async fn test_one_pending_submission_per_tenant_and_fee() {
        let fx = fixture().await;

        let first = submit(&fx, 150).await.unwrap();
        assert_eq!(first.status, SubmissionStatus::Pending);

        // Second pending submission for the same (tenant, fee type) hits
        // the partial unique index
        let err = submit(&fx, 160).await.unwrap_err();
        assert!(err.is_unique_violation());

        // After review the slot frees up
        fx.db
            .meters()
            .reject_submission(&first.id, "photo unreadable", "staff-1")
            .await
            .unwrap();
        assert!(submit(&fx, 160).await.is_ok());
    }

    #[tokio::test]
    async fn test_approve_creates_reading_and_links_it() {
        let fx = fixture().await;
        let submission = submit(&fx, 150).await.unwrap();

        let reading = fx
            .db
            .meters()
            .approve_submission(&submission.id, &reading_draft(&fx, 100, 150), "staff-1")
            .await
            .unwrap();

        let stored = fx
            .db
            .meters()
            .get_submission(&submission.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubmissionStatus::Approved);
        assert_eq!(stored.meter_reading_id.as_deref(), Some(reading.id.as_str()));
        assert_eq!(stored.reviewed_by.as_deref(), Some("staff-1"));

        // Reading became the new monotonicity baseline
        let baseline = fx
            .db
            .meters()
            .latest_accepted_value(&fx.unit.id, &fx.water.id)
            .await
            .unwrap();
        assert_eq!(baseline, 150);
    }

    #[tokio::test]
    async fn test_review_is_terminal() {
        let fx = fixture().await;
        let submission = submit(&fx, 150).await.unwrap();

        fx.db
            .meters()
            .reject_submission(&submission.id, "implausible jump", "staff-1")
            .await
            .unwrap();

        // Approving a rejected submission is a conflict, and no reading
        // may appear as a side effect of the failed attempt
        let err = fx
            .db
            .meters()
            .approve_submission(&submission.id, &reading_draft(&fx, 0, 150), "staff-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let baseline = fx
            .db
            .meters()
            .latest_accepted_value(&fx.unit.id, &fx.water.id)
            .await
            .unwrap();
        assert_eq!(baseline, 0);

        // Re-rejecting is a conflict too
        let err = fx
            .db
            .meters()
            .reject_submission(&submission.id, "again", "staff-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_latest_reading_in_month() {
        let fx = fixture().await;

        fx.db
            .meters()
            .insert_reading(&NewMeterReading {
                reading_date: date(2026, 1, 31),
                previous_value: 0,
                current_value: 100,
                source: ReadingSource::Staff,
                ..reading_draft(&fx, 0, 100)
            })
            .await
            .unwrap();
        fx.db
            .meters()
            .insert_reading(&NewMeterReading {
                reading_date: date(2026, 2, 28),
                ..reading_draft(&fx, 100, 150)
            })
            .await
            .unwrap();

        let feb = fx
            .db
            .meters()
            .latest_reading_in_month(&fx.unit.id, &fx.water.id, "2026-02")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feb.current_value, 150);
        assert_eq!(feb.consumption(), 50);

        assert!(fx
            .db
            .meters()
            .latest_reading_in_month(&fx.unit.id, &fx.water.id, "2026-03")
            .await
            .unwrap()
            .is_none());
    }
}
