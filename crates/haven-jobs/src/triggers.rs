//! # Scheduled Triggers
//!
//! The date-driven producers: payment reminders, lease expiry notices and
//! the overdue sweep. Each is invoked once per day by the scheduler and is
//! idempotent under re-runs — dedupe keys absorb repeated invocations, and
//! the sweep's status transition only fires once per billing.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, warn};

use haven_core::{NotificationPayload, NotificationSettings};
use haven_db::Database;

use crate::config::JobsConfig;
use crate::error::JobsResult;
use crate::notify::fan_out_to_tenant;

/// Tally of one trigger run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TriggerReport {
    /// Matching rows found (billings in a window, leases ending, swept).
    pub scanned: u64,
    /// Queue rows created.
    pub queued: u64,
    /// Deliberate non-deliveries (disabled, no contact, duplicate).
    pub skipped: u64,
    /// Leases moved active → expired (lease trigger only).
    pub expired: u64,
}

/// Per-company settings, loaded once per run.
struct SettingsCache {
    cache: HashMap<String, NotificationSettings>,
}

impl SettingsCache {
    fn new() -> Self {
        SettingsCache {
            cache: HashMap::new(),
        }
    }

    async fn get(&mut self, db: &Database, company_id: &str) -> JobsResult<&NotificationSettings> {
        if !self.cache.contains_key(company_id) {
            let settings = db.notifications().load_settings(company_id).await?;
            self.cache.insert(company_id.to_string(), settings);
        }
        Ok(&self.cache[company_id])
    }
}

// =============================================================================
// Payment Reminders
// =============================================================================

/// Queues payment reminders for open billings due in each configured
/// window (default 7 and 3 days out).
pub async fn run_billing_reminders(
    db: &Database,
    config: &JobsConfig,
    today: NaiveDate,
) -> JobsResult<TriggerReport> {
    let billings = db.billings();
    let companies = db.companies();
    let notifications = db.notifications();
    let mut settings = SettingsCache::new();
    let mut report = TriggerReport::default();

    for &days in &config.reminder_days {
        let target = today + Duration::days(days);
        for billing in billings.open_due_on(target).await? {
            report.scanned += 1;

            let Some(tenant) = companies.get_tenant(&billing.tenant_id).await? else {
                warn!(billing_id = %billing.id, tenant_id = %billing.tenant_id,
                      "Billing references a missing tenant, reminder not sent");
                continue;
            };

            let payload = NotificationPayload::PaymentReminder {
                billing_id: billing.id.clone(),
                billing_month: billing.billing_month.clone(),
                remaining_minor: billing.remaining().minor(),
                due_date: billing.due_date,
                days_until_due: days,
            };
            let dedupe_key = format!("billing:{}:reminder:{}d", billing.id, days);

            let fan_out = fan_out_to_tenant(
                &notifications,
                settings.get(db, &billing.company_id).await?,
                &tenant,
                &payload,
                Some(&dedupe_key),
                Utc::now(),
            )
            .await?;
            report.queued += fan_out.queued;
            report.skipped += fan_out.skipped;
        }
    }

    info!(
        scanned = report.scanned,
        queued = report.queued,
        skipped = report.skipped,
        "Billing reminder run complete"
    );
    Ok(report)
}

// =============================================================================
// Lease Expiry
// =============================================================================

/// Expires leases whose end date has passed, then queues expiry notices
/// for active leases ending in each configured window (default 30, 14 and
/// 7 days out).
pub async fn run_lease_expiry(
    db: &Database,
    config: &JobsConfig,
    today: NaiveDate,
) -> JobsResult<TriggerReport> {
    let leases = db.leases();
    let companies = db.companies();
    let notifications = db.notifications();
    let mut settings = SettingsCache::new();
    let mut report = TriggerReport::default();

    report.expired = leases.expire_ended(today).await?;
    if report.expired > 0 {
        info!(count = report.expired, "Expired ended leases");
    }

    for &days in &config.lease_expiry_days {
        let target = today + Duration::days(days);
        for lease in leases.active_ending_on(target).await? {
            report.scanned += 1;

            let Some(tenant) = companies.get_tenant(&lease.tenant_id).await? else {
                warn!(lease_id = %lease.id, tenant_id = %lease.tenant_id,
                      "Lease references a missing tenant, expiry notice not sent");
                continue;
            };
            let unit_name = match companies.get_unit(&lease.unit_id).await? {
                Some(unit) => unit.name,
                None => lease.unit_id.clone(),
            };

            let payload = NotificationPayload::LeaseExpiring {
                lease_id: lease.id.clone(),
                unit_name,
                end_date: lease.end_date,
                days_remaining: days,
            };
            let dedupe_key = format!("lease:{}:expiring:{}d", lease.id, days);

            let fan_out = fan_out_to_tenant(
                &notifications,
                settings.get(db, &lease.company_id).await?,
                &tenant,
                &payload,
                Some(&dedupe_key),
                Utc::now(),
            )
            .await?;
            report.queued += fan_out.queued;
            report.skipped += fan_out.skipped;
        }
    }

    info!(
        expired = report.expired,
        scanned = report.scanned,
        queued = report.queued,
        "Lease expiry run complete"
    );
    Ok(report)
}

// =============================================================================
// Overdue Sweep
// =============================================================================

/// Moves open billings past their due date to `overdue` and queues one
/// overdue notice per newly swept billing.
pub async fn run_overdue_sweep(db: &Database, today: NaiveDate) -> JobsResult<TriggerReport> {
    let companies = db.companies();
    let notifications = db.notifications();
    let mut settings = SettingsCache::new();
    let mut report = TriggerReport::default();

    for billing in db.billings().sweep_overdue(today).await? {
        report.scanned += 1;

        let Some(tenant) = companies.get_tenant(&billing.tenant_id).await? else {
            warn!(billing_id = %billing.id, tenant_id = %billing.tenant_id,
                  "Billing references a missing tenant, overdue notice not sent");
            continue;
        };

        let payload = NotificationPayload::OverdueNotice {
            billing_id: billing.id.clone(),
            billing_month: billing.billing_month.clone(),
            remaining_minor: billing.remaining().minor(),
            due_date: billing.due_date,
        };
        let dedupe_key = format!("billing:{}:overdue", billing.id);

        let fan_out = fan_out_to_tenant(
            &notifications,
            settings.get(db, &billing.company_id).await?,
            &tenant,
            &payload,
            Some(&dedupe_key),
            Utc::now(),
        )
        .await?;
        report.queued += fan_out.queued;
        report.skipped += fan_out.skipped;
    }

    info!(
        swept = report.scanned,
        queued = report.queued,
        "Overdue sweep complete"
    );
    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================
