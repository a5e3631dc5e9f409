//! # Billing Repository
//!
//! Database operations for billings, line items, and payments.
//!
//! ## Payment Serialization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_payment(billing, outcome)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    INSERT payments (...)                                                │
//! │    UPDATE billings SET paid_minor = new, status = new                   │
//! │        WHERE id = ? AND paid_minor = expected                           │
//! │              AND status != 'cancelled'          ← CAS guard             │
//! │    rows_affected == 0 → ROLLBACK → Conflict (caller reloads, retries)   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Two concurrent payments serialize through the paid_minor guard:       │
//! │  the loser observes the winner's new paid figure on reload.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use haven_core::billing::PaymentOutcome;
use haven_core::fees::LineItem;
use haven_core::{
    Billing, BillingDetails, BillingItem, BillingStatus, Payment, PaymentMethod, PaymentStatus,
};

/// Field set for a billing about to be created. The repository assigns the
/// id, timestamps, and the initial `pending` status.
#[derive(Debug, Clone)]
pub struct NewBilling {
    pub company_id: String,
    pub tenant_id: String,
    pub unit_id: String,
    pub lease_id: String,
    /// `YYYY-MM`.
    pub billing_month: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
}

/// Repository for billing database operations.
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: SqlitePool,
}

impl BillingRepository {
    /// Creates a new BillingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BillingRepository { pool }
    }

    /// Creates a billing with its line items in one transaction.
    ///
    /// The UNIQUE(lease_id, billing_month) constraint makes issuance
    /// idempotent: a re-run for an already-billed month surfaces as
    /// [`DbError::UniqueViolation`], which the issuance job treats as a
    /// skip, not an error.
    pub async fn create_billing(&self, new: NewBilling, items: &[LineItem]) -> DbResult<Billing> {
        let now = Utc::now();
        let billing = Billing {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id,
            tenant_id: new.tenant_id,
            unit_id: new.unit_id,
            lease_id: new.lease_id,
            billing_month: new.billing_month,
            issue_date: new.issue_date,
            due_date: new.due_date,
            subtotal_minor: new.subtotal_minor,
            tax_minor: new.tax_minor,
            total_minor: new.total_minor,
            paid_minor: 0,
            status: BillingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %billing.id,
            lease_id = %billing.lease_id,
            month = %billing.billing_month,
            total = billing.total_minor,
            "Creating billing"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO billings (
                id, company_id, tenant_id, unit_id, lease_id,
                billing_month, issue_date, due_date,
                subtotal_minor, tax_minor, total_minor, paid_minor,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&billing.id)
        .bind(&billing.company_id)
        .bind(&billing.tenant_id)
        .bind(&billing.unit_id)
        .bind(&billing.lease_id)
        .bind(&billing.billing_month)
        .bind(billing.issue_date)
        .bind(billing.due_date)
        .bind(billing.subtotal_minor)
        .bind(billing.tax_minor)
        .bind(billing.total_minor)
        .bind(billing.paid_minor)
        .bind(billing.status)
        .bind(billing.created_at)
        .bind(billing.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO billing_items (
                    id, billing_id, fee_type_id, name, quantity,
                    unit_price_minor, amount_minor, description, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&billing.id)
            .bind(&item.fee_type_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price_minor)
            .bind(item.amount.minor())
            .bind(&item.description)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(billing)
    }

    /// Gets a billing by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Billing>> {
        let billing = sqlx::query_as::<_, Billing>("SELECT * FROM billings WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(billing)
    }

    /// Gets a billing with its line items and payments.
    pub async fn get_details(&self, id: &str) -> DbResult<Option<BillingDetails>> {
        let Some(billing) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, BillingItem>(
            "SELECT * FROM billing_items WHERE billing_id = ?1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE billing_id = ?1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(BillingDetails {
            billing,
            items,
            payments,
        }))
    }

    /// Lists billings for a company, optionally filtered by month.
    pub async fn list_for_company(
        &self,
        company_id: &str,
        billing_month: Option<&str>,
    ) -> DbResult<Vec<Billing>> {
        let billings = match billing_month {
            Some(month) => {
                sqlx::query_as::<_, Billing>(
                    r#"
                    SELECT * FROM billings
                    WHERE company_id = ?1 AND billing_month = ?2
                    ORDER BY created_at
                    "#,
                )
                .bind(company_id)
                .bind(month)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Billing>(
                    r#"
                    SELECT * FROM billings
                    WHERE company_id = ?1
                    ORDER BY billing_month DESC, created_at
                    "#,
                )
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(billings)
    }

    /// Records a payment and moves the billing in one transaction.
    ///
    /// `expected_paid` is the paid figure the caller computed the outcome
    /// from; the update is guarded on it. On [`DbError::Conflict`] the
    /// caller reloads the billing and recomputes.
    pub async fn record_payment(
        &self,
        billing_id: &str,
        expected_paid: i64,
        outcome: PaymentOutcome,
        amount_minor: i64,
        paid_on: NaiveDate,
        method: PaymentMethod,
    ) -> DbResult<Payment> {
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            billing_id: billing_id.to_string(),
            amount_minor,
            paid_on,
            method,
            status: PaymentStatus::Completed,
            created_at: Utc::now(),
        };

        if outcome.overpaid {
            warn!(
                billing_id = %billing_id,
                new_paid = outcome.new_paid.minor(),
                "Payment exceeds billing total"
            );
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, billing_id, amount_minor, paid_on, method, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.billing_id)
        .bind(payment.amount_minor)
        .bind(payment.paid_on)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE billings SET
                paid_minor = ?3,
                status = ?4,
                updated_at = ?5
            WHERE id = ?1 AND paid_minor = ?2 AND status != 'cancelled'
            "#,
        )
        .bind(billing_id)
        .bind(expected_paid)
        .bind(outcome.new_paid.minor())
        .bind(outcome.new_status)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::conflict(format!(
                "billing {billing_id} changed concurrently"
            )));
        }

        tx.commit().await?;

        debug!(
            billing_id = %billing_id,
            payment_id = %payment.id,
            amount = amount_minor,
            new_status = ?outcome.new_status,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Gets a payment by ID.
    pub async fn get_payment(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    /// Deletes a payment and reverses its effect on the owning billing in
    /// one transaction, under the same CAS guard as [`Self::record_payment`].
    pub async fn delete_payment(
        &self,
        billing_id: &str,
        payment_id: &str,
        expected_paid: i64,
        outcome: PaymentOutcome,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM payments WHERE id = ?1 AND billing_id = ?2")
            .bind(payment_id)
            .bind(billing_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::not_found("Payment", payment_id));
        }

        let result = sqlx::query(
            r#"
            UPDATE billings SET
                paid_minor = ?3,
                status = ?4,
                updated_at = ?5
            WHERE id = ?1 AND paid_minor = ?2 AND status != 'cancelled'
            "#,
        )
        .bind(billing_id)
        .bind(expected_paid)
        .bind(outcome.new_paid.minor())
        .bind(outcome.new_status)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::conflict(format!(
                "billing {billing_id} changed concurrently"
            )));
        }

        tx.commit().await?;

        debug!(
            billing_id = %billing_id,
            payment_id = %payment_id,
            new_status = ?outcome.new_status,
            "Payment deleted and billing recomputed"
        );

        Ok(())
    }

    /// Cancels a billing. The guard mirrors the state machine: `pending`,
    /// `partial`, and `overdue` may cancel; `paid` and `cancelled` may not.
    ///
    /// Returns the cancelled billing, or [`DbError::Conflict`] / NotFound.
    pub async fn cancel(&self, billing_id: &str) -> DbResult<Billing> {
        let cancelled = sqlx::query_as::<_, Billing>(
            r#"
            UPDATE billings SET
                status = 'cancelled',
                updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'partial', 'overdue')
            RETURNING *
            "#,
        )
        .bind(billing_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match cancelled {
            Some(billing) => Ok(billing),
            None => match self.get_by_id(billing_id).await? {
                Some(existing) => Err(DbError::conflict(format!(
                    "billing {billing_id} cannot be cancelled from status {:?}",
                    existing.status
                ))),
                None => Err(DbError::not_found("Billing", billing_id)),
            },
        }
    }

    /// Moves every past-due open billing to `overdue` and returns the moved
    /// rows. Idempotent: already-overdue billings are not matched again.
    pub async fn sweep_overdue(&self, today: NaiveDate) -> DbResult<Vec<Billing>> {
        let swept = sqlx::query_as::<_, Billing>(
            r#"
            UPDATE billings SET
                status = 'overdue',
                updated_at = ?2
            WHERE status IN ('pending', 'partial') AND due_date < ?1
            RETURNING *
            "#,
        )
        .bind(today)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        Ok(swept)
    }

    /// Lists open (pending/partial) billings due exactly on the given date.
    /// The reminder trigger calls this once per configured window.
    pub async fn open_due_on(&self, due_date: NaiveDate) -> DbResult<Vec<Billing>> {
        let billings = sqlx::query_as::<_, Billing>(
            r#"
            SELECT * FROM billings
            WHERE status IN ('pending', 'partial') AND due_date = ?1
            ORDER BY created_at
            "#,
        )
        .bind(due_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(billings)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{date, fixture, Fixture};
    use haven_core::billing::apply_payment;
    use haven_core::fees::LineItem;
    use haven_core::Money;

    fn rent_item(fx: &Fixture) -> LineItem {
        LineItem {
            fee_type_id: Some(fx.rent.id.clone()),
            name: "Rent".into(),
            quantity: 1,
            unit_price_minor: None,
            amount: Money::from_minor(85_000),
            description: None,
        }
    }

    async fn issue(fx: &Fixture, month: &str, due: NaiveDate) -> Billing {
        fx.db
            .billings()
            .create_billing(
                NewBilling {
                    company_id: fx.company.id.clone(),
                    tenant_id: fx.tenant.id.clone(),
                    unit_id: fx.unit.id.clone(),
                    lease_id: fx.lease.id.clone(),
                    billing_month: month.to_string(),
                    issue_date: date(2026, 3, 1),
                    due_date: due,
                    subtotal_minor: 85_000,
                    tax_minor: 8_500,
                    total_minor: 93_500,
                },
                &[rent_item(fx)],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_billing_with_items() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-03", date(2026, 3, 20)).await;

        let details = fx
            .db
            .billings()
            .get_details(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.billing.status, BillingStatus::Pending);
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].amount_minor, 85_000);
        assert!(details.payments.is_empty());
    }

    #[tokio::test]
    async fn test_delete_payment_reverses_billing() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-03", date(2026, 3, 20)).await;
        let today = date(2026, 3, 5);

        let outcome = apply_payment(
            &billing.id,
            billing.status,
            billing.paid(),
            billing.total(),
            Money::from_minor(40_000),
            billing.due_date,
            today,
        )
        .unwrap();
        let payment = fx
            .db
            .billings()
            .record_payment(
                &billing.id,
                billing.paid_minor,
                outcome,
                40_000,
                today,
                PaymentMethod::BankTransfer,
            )
            .await
            .unwrap();

        let partial = fx
            .db
            .billings()
            .get_by_id(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(partial.status, BillingStatus::Partial);

        let reversal = haven_core::billing::remove_payment(
            &billing.id,
            partial.status,
            partial.paid(),
            partial.total(),
            payment.amount(),
            partial.due_date,
            today,
        )
        .unwrap();
        fx.db
            .billings()
            .delete_payment(&billing.id, &payment.id, partial.paid_minor, reversal)
            .await
            .unwrap();

        let reverted = fx
            .db
            .billings()
            .get_by_id(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reverted.status, BillingStatus::Pending);
        assert_eq!(reverted.paid_minor, 0);
        assert!(fx
            .db
            .billings()
            .get_payment(&payment.id)
            .await
            .unwrap()
            .is_none());

        // Deleting the same payment again is NotFound, and the billing is
        // left untouched
        let err = fx
            .db
            .billings()
            .delete_payment(&billing.id, &payment.id, reverted.paid_minor, reversal)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_month_rejected() {
        let fx = fixture().await;
        issue(&fx, "2026-03", date(2026, 3, 20)).await;

        let err = fx
            .db
            .billings()
            .create_billing(
                NewBilling {
                    company_id: fx.company.id.clone(),
                    tenant_id: fx.tenant.id.clone(),
                    unit_id: fx.unit.id.clone(),
                    lease_id: fx.lease.id.clone(),
                    billing_month: "2026-03".to_string(),
                    issue_date: date(2026, 3, 2),
                    due_date: date(2026, 3, 20),
                    subtotal_minor: 85_000,
                    tax_minor: 8_500,
                    total_minor: 93_500,
                },
                &[],
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_payment_sequence() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-03", date(2026, 3, 20)).await;
        let today = date(2026, 3, 5);

        let outcome = apply_payment(
            &billing.id,
            billing.status,
            billing.paid(),
            billing.total(),
            Money::from_minor(40_000),
            billing.due_date,
            today,
        )
        .unwrap();
        fx.db
            .billings()
            .record_payment(
                &billing.id,
                billing.paid_minor,
                outcome,
                40_000,
                today,
                PaymentMethod::BankTransfer,
            )
            .await
            .unwrap();

        let reloaded = fx
            .db
            .billings()
            .get_by_id(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status, BillingStatus::Partial);
        assert_eq!(reloaded.paid_minor, 40_000);

        let outcome = apply_payment(
            &reloaded.id,
            reloaded.status,
            reloaded.paid(),
            reloaded.total(),
            Money::from_minor(53_500),
            reloaded.due_date,
            today,
        )
        .unwrap();
        fx.db
            .billings()
            .record_payment(
                &reloaded.id,
                reloaded.paid_minor,
                outcome,
                53_500,
                today,
                PaymentMethod::Cash,
            )
            .await
            .unwrap();

        let paid = fx
            .db
            .billings()
            .get_by_id(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, BillingStatus::Paid);

        let details = fx
            .db
            .billings()
            .get_details(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_payment_cas_rejects_stale_expectation() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-03", date(2026, 3, 20)).await;
        let today = date(2026, 3, 5);

        let outcome = apply_payment(
            &billing.id,
            billing.status,
            billing.paid(),
            billing.total(),
            Money::from_minor(10_000),
            billing.due_date,
            today,
        )
        .unwrap();

        // Stale expected_paid: pretend another payment landed first
        let err = fx
            .db
            .billings()
            .record_payment(
                &billing.id,
                99_999,
                outcome,
                10_000,
                today,
                PaymentMethod::Cash,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // Billing untouched, no orphan payment row
        let reloaded = fx
            .db
            .billings()
            .get_details(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.billing.paid_minor, 0);
        assert!(reloaded.payments.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-03", date(2026, 3, 20)).await;

        let cancelled = fx.db.billings().cancel(&billing.id).await.unwrap();
        assert_eq!(cancelled.status, BillingStatus::Cancelled);

        // Second cancel is a conflict, not a silent no-op
        let err = fx.db.billings().cancel(&billing.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        let err = fx.db.billings().cancel("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_sweep_overdue_is_idempotent() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-02", date(2026, 2, 20)).await;

        let swept = fx
            .db
            .billings()
            .sweep_overdue(date(2026, 2, 21))
            .await
            .unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, billing.id);
        assert_eq!(swept[0].status, BillingStatus::Overdue);

        // Re-run matches nothing
        let again = fx
            .db
            .billings()
            .sweep_overdue(date(2026, 2, 21))
            .await
            .unwrap();
        assert!(again.is_empty());

        // Due today is not overdue yet
        let fx2 = fixture().await;
        issue(&fx2, "2026-02", date(2026, 2, 20)).await;
        let none = fx2
            .db
            .billings()
            .sweep_overdue(date(2026, 2, 20))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_open_due_on() {
        let fx = fixture().await;
        let billing = issue(&fx, "2026-03", date(2026, 3, 20)).await;

        let hits = fx.db.billings().open_due_on(date(2026, 3, 20)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, billing.id);

        assert!(fx
            .db
            .billings()
            .open_due_on(date(2026, 3, 21))
            .await
            .unwrap()
            .is_empty());
    }
}
