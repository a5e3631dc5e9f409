//! # Monthly Billing Issuance
//!
//! Generates one billing per active lease for a billing month. The run is
//! idempotent: the (lease, month) uniqueness constraint makes a re-run skip
//! every lease it already issued, so a crashed run is simply re-invoked.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per company, per active lease:                                          │
//! │                                                                          │
//! │    per active fee type                                                   │
//! │      ├─ override  ◄── unit_fee_overrides (unit, fee type)                │
//! │      ├─ area      ◄── unit record                                        │
//! │      ├─ reading   ◄── latest accepted reading in the month (metered)     │
//! │      └─ build_line_item ── zero-amount lines are dropped                 │
//! │                                                                          │
//! │    no lines ──► no billing for this lease this month                     │
//! │    lines ─────► totals (company tax rate) ──► INSERT billing             │
//! │                   │                                                      │
//! │                   ├─ duplicate (lease, month) ──► skip, count it         │
//! │                   └─ created ──► queue "billing issued" notification     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use haven_core::fees::{billing_totals, build_line_item, FeeContext, LineItem};
use haven_core::validation::validate_billing_month;
use haven_core::{CoreError, FeeKind, Lease, NotificationPayload};
use haven_db::{Database, NewBilling};

use crate::config::JobsConfig;
use crate::error::JobsResult;
use crate::notify::fan_out_to_tenant;

/// Tally of one issuance run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IssuanceReport {
    /// Active leases examined.
    pub leases: u64,
    /// Billings created.
    pub issued: u64,
    /// Leases already billed for the month (idempotent re-run).
    pub skipped_existing: u64,
    /// Leases with no chargeable line items this month.
    pub no_charges: u64,
    /// Notification queue rows created.
    pub queued: u64,
}

/// Issues billings for every active lease across all companies.
///
/// `today` becomes the issue date; the due date follows it by the
/// configured grace period.
pub async fn run_monthly_issuance(
    db: &Database,
    config: &JobsConfig,
    billing_month: &str,
    today: NaiveDate,
) -> JobsResult<IssuanceReport> {
    validate_billing_month(billing_month).map_err(CoreError::from)?;

    let companies = db.companies();
    let notifications = db.notifications();
    let mut report = IssuanceReport::default();

    for company in companies.list_companies().await? {
        let fee_types = db.fees().list_active_for_company(&company.id).await?;
        let settings = notifications.load_settings(&company.id).await?;

        for lease in db.leases().list_active_for_company(&company.id).await? {
            report.leases += 1;

            let items = match compute_lease_items(db, &lease, &fee_types, billing_month).await? {
                Some(items) => items,
                None => {
                    report.no_charges += 1;
                    continue;
                }
            };

            let totals = billing_totals(&items, company.tax_rate());
            let due_date = today + Duration::days(config.due_in_days);

            let created = db
                .billings()
                .create_billing(
                    NewBilling {
                        company_id: company.id.clone(),
                        tenant_id: lease.tenant_id.clone(),
                        unit_id: lease.unit_id.clone(),
                        lease_id: lease.id.clone(),
                        billing_month: billing_month.to_string(),
                        issue_date: today,
                        due_date,
                        subtotal_minor: totals.subtotal.minor(),
                        tax_minor: totals.tax.minor(),
                        total_minor: totals.total.minor(),
                    },
                    &items,
                )
                .await;

            let billing = match created {
                Ok(billing) => billing,
                Err(err) if err.is_unique_violation() => {
                    debug!(lease_id = %lease.id, billing_month, "Lease already billed, skipping");
                    report.skipped_existing += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            report.issued += 1;

            let Some(tenant) = companies.get_tenant(&lease.tenant_id).await? else {
                warn!(lease_id = %lease.id, tenant_id = %lease.tenant_id,
                      "Lease references a missing tenant, issuance notice not sent");
                continue;
            };

            let payload = NotificationPayload::BillingIssued {
                billing_id: billing.id.clone(),
                billing_month: billing.billing_month.clone(),
                total_minor: billing.total_minor,
                due_date: billing.due_date,
            };
            let dedupe_key = format!("billing:{}:issued", billing.id);
            let fan_out = fan_out_to_tenant(
                &notifications,
                &settings,
                &tenant,
                &payload,
                Some(&dedupe_key),
                Utc::now(),
            )
            .await?;
            report.queued += fan_out.queued;
        }
    }

    info!(
        billing_month,
        leases = report.leases,
        issued = report.issued,
        skipped_existing = report.skipped_existing,
        no_charges = report.no_charges,
        "Monthly issuance complete"
    );
    Ok(report)
}

/// Computes the chargeable line items for one lease, or `None` when the
/// month produces no charges at all.
async fn compute_lease_items(
    db: &Database,
    lease: &Lease,
    fee_types: &[haven_core::FeeType],
    billing_month: &str,
) -> JobsResult<Option<Vec<LineItem>>> {
    let unit = match db.companies().get_unit(&lease.unit_id).await? {
        Some(unit) => unit,
        None => {
            warn!(lease_id = %lease.id, unit_id = %lease.unit_id,
                  "Lease references a missing unit, not billed");
            return Ok(None);
        }
    };

    let mut items = Vec::new();
    for fee_type in fee_types {
        let fee_override = db.fees().get_override(&unit.id, &fee_type.id).await?;
        let reading = if fee_type.kind == FeeKind::Metered {
            db.meters()
                .latest_reading_in_month(&unit.id, &fee_type.id, billing_month)
                .await?
        } else {
            None
        };

        let ctx = FeeContext {
            fee_override: fee_override.as_ref(),
            area_csqm: unit.area_csqm,
            reading: reading.as_ref(),
        };
        let item = build_line_item(fee_type, &ctx);

        // Zero lines (no reading, unmeasured unit, unconfigured fee) are
        // dropped rather than shown as ¥0 rows on the invoice.
        if item.amount.is_positive() {
            items.push(item);
        }
    }

    Ok(if items.is_empty() { None } else { Some(items) })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{NotificationType, QueueStatus, ReadingSource};
    use haven_db::DbConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        db: Database,
        company_id: String,
        unit_id: String,
        tenant_id: String,
        lease_id: String,
        water_id: String,
    }

    /// Company at 10% tax, one unit (50 m²), fixed rent 85,000 and a
    /// metered water fee at 500/unit.
    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory db");
        let companies = db.companies();

        let company = companies.create_company("Test PM", 1000).await.unwrap();
        let unit = companies
            .create_unit(&company.id, "203", Some(5000))
            .await
            .unwrap();
        let tenant = companies
            .create_tenant(&company.id, "Tanaka", Some("tanaka@example.com"), None)
            .await
            .unwrap();
        let lease = db
            .leases()
            .create_lease(
                &company.id,
                &unit.id,
                &tenant.id,
                date(2025, 4, 1),
                date(2027, 3, 31),
            )
            .await
            .unwrap();

        let fees = db.fees();
        fees.create_fee_type(&company.id, "Rent", FeeKind::Fixed, Some(85_000), None, 0)
            .await
            .unwrap();
        let water = fees
            .create_fee_type(&company.id, "Water", FeeKind::Metered, None, Some(500), 1)
            .await
            .unwrap();

        Fixture {
            db,
            company_id: company.id,
            unit_id: unit.id,
            tenant_id: tenant.id,
            lease_id: lease.id,
            water_id: water.id,
        }
    }

    async fn record_water_reading(fx: &Fixture, date_read: NaiveDate, previous: i64, current: i64) {
        fx.db
            .meters()
            .insert_reading(&haven_core::metering::NewMeterReading {
                company_id: fx.company_id.clone(),
                unit_id: fx.unit_id.clone(),
                fee_type_id: fx.water_id.clone(),
                reading_date: date_read,
                previous_value: previous,
                current_value: current,
                unit_price_minor: 500,
                recorded_by: "staff-1".into(),
                source: ReadingSource::Staff,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_issuance_builds_billing_from_fee_catalog() {
        let fx = fixture().await;
        record_water_reading(&fx, date(2026, 3, 15), 100, 150).await;

        let report = run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026-03",
            date(2026, 3, 31),
        )
        .await
        .unwrap();
        assert_eq!(report.leases, 1);
        assert_eq!(report.issued, 1);

        let billings = fx
            .db
            .billings()
            .list_for_company(&fx.company_id, Some("2026-03"))
            .await
            .unwrap();
        assert_eq!(billings.len(), 1);
        let billing = &billings[0];

        // Rent 85,000 + water 50 × 500 = 110,000; 10% tax on top
        assert_eq!(billing.subtotal_minor, 110_000);
        assert_eq!(billing.tax_minor, 11_000);
        assert_eq!(billing.total_minor, 121_000);
        assert_eq!(billing.lease_id, fx.lease_id);
        assert_eq!(
            billing.due_date,
            date(2026, 3, 31) + Duration::days(20)
        );

        let details = fx
            .db
            .billings()
            .get_details(&billing.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.items.len(), 2);

        // Issuance notice queued for the tenant (email only, no phone)
        let pending = fx
            .db
            .notifications()
            .list_for_company(&fx.company_id, Some(QueueStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].notification_type, NotificationType::BillingIssued);
        assert_eq!(pending[0].recipient_id, fx.tenant_id);
    }

    #[tokio::test]
    async fn test_issuance_rerun_skips_billed_leases() {
        let fx = fixture().await;

        let first = run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026-03",
            date(2026, 3, 31),
        )
        .await
        .unwrap();
        assert_eq!(first.issued, 1);

        let rerun = run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026-03",
            date(2026, 3, 31),
        )
        .await
        .unwrap();
        assert_eq!(rerun.issued, 0);
        assert_eq!(rerun.skipped_existing, 1);

        // Still exactly one billing and one queued notice
        let billings = fx
            .db
            .billings()
            .list_for_company(&fx.company_id, Some("2026-03"))
            .await
            .unwrap();
        assert_eq!(billings.len(), 1);
        assert_eq!(fx.db.notifications().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_metered_fee_without_reading_is_omitted() {
        let fx = fixture().await;
        // No water reading recorded for the month

        run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026-03",
            date(2026, 3, 31),
        )
        .await
        .unwrap();

        let billings = fx
            .db
            .billings()
            .list_for_company(&fx.company_id, Some("2026-03"))
            .await
            .unwrap();
        let details = fx
            .db
            .billings()
            .get_details(&billings[0].id)
            .await
            .unwrap()
            .unwrap();

        // Only the rent line; no ¥0 water row
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].name, "Rent");
        assert_eq!(billings[0].subtotal_minor, 85_000);
    }

    #[tokio::test]
    async fn test_override_discount_applies() {
        let fx = fixture().await;

        // Rent discounted to 80,000 for this unit
        let fees = fx.db.fees();
        let rent = fees
            .list_active_for_company(&fx.company_id)
            .await
            .unwrap()
            .into_iter()
            .find(|f| f.name == "Rent")
            .unwrap();
        fees.upsert_override(&fx.unit_id, &rent.id, Some(80_000), None, true)
            .await
            .unwrap();

        run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026-03",
            date(2026, 3, 31),
        )
        .await
        .unwrap();

        let billings = fx
            .db
            .billings()
            .list_for_company(&fx.company_id, Some("2026-03"))
            .await
            .unwrap();
        assert_eq!(billings[0].subtotal_minor, 80_000);
    }

    #[tokio::test]
    async fn test_lease_with_no_charges_gets_no_billing() {
        let fx = fixture().await;

        // Deactivate every fee type: nothing left to charge
        let fees = fx.db.fees();
        for fee_type in fees.list_active_for_company(&fx.company_id).await.unwrap() {
            fees.set_active(&fee_type.id, false).await.unwrap();
        }

        let report = run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026-03",
            date(2026, 3, 31),
        )
        .await
        .unwrap();
        assert_eq!(report.no_charges, 1);
        assert_eq!(report.issued, 0);

        let billings = fx
            .db
            .billings()
            .list_for_company(&fx.company_id, Some("2026-03"))
            .await
            .unwrap();
        assert!(billings.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_month_is_rejected() {
        let fx = fixture().await;
        let result = run_monthly_issuance(
            &fx.db,
            &JobsConfig::default(),
            "2026/03",
            date(2026, 3, 31),
        )
        .await;
        assert!(result.is_err());
    }
}
