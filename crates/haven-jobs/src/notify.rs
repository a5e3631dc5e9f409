//! # Enqueue Workflow
//!
//! The single producer-side gate in front of the notification queue. Every
//! notification the pipeline emits goes through [`enqueue`], which applies
//! the per-company rules, snapshots the recipient address, and records
//! deliberate non-deliveries as terminal `skipped` audit rows.
//!
//! ## Skip Semantics
//! A disabled channel or a missing contact is never an error: the caller's
//! operation (payment, approval, trigger run) succeeds, and the queue keeps
//! a `skipped` row so staff can see *why* nothing went out.

use chrono::{DateTime, Utc};
use tracing::debug;

use haven_core::{
    Billing, Channel, EnqueueOutcome, NotificationPayload, NotificationSettings, Payment,
    QueueStatus, RecipientType, SkipReason, Tenant,
};
use haven_db::{NewNotification, NotificationRepository};

use crate::error::JobsResult;

// =============================================================================
// Requests & Reports
// =============================================================================

/// One enqueue attempt for one (recipient, channel) pair.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub company_id: String,
    pub recipient_type: RecipientType,
    pub recipient_id: String,
    pub channel: Channel,
    /// Destination address, when the recipient has one for the channel.
    pub recipient_address: Option<String>,
    pub payload: NotificationPayload,
    pub dedupe_key: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

/// Tally of a multi-channel fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FanOutReport {
    pub queued: u64,
    pub skipped: u64,
}

impl FanOutReport {
    fn absorb(&mut self, outcome: &EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Queued(_) => self.queued += 1,
            EnqueueOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

// =============================================================================
// Enqueue
// =============================================================================

/// The recipient's address for a channel, if they have one.
pub fn tenant_contact(tenant: &Tenant, channel: Channel) -> Option<String> {
    match channel {
        Channel::Email => tenant.email.clone(),
        Channel::Sms => tenant.phone.clone(),
    }
}

/// Enqueues one notification, or records why it was not enqueued.
///
/// Ordering of the gates matters: a disabled channel is reported as
/// `ChannelDisabled` even when the contact is also missing, because the
/// company's choice is the more actionable fact.
pub async fn enqueue(
    repo: &NotificationRepository,
    settings: &NotificationSettings,
    req: EnqueueRequest,
) -> JobsResult<EnqueueOutcome> {
    let notification_type = req.payload.notification_type();

    if !settings.is_enabled(req.channel, notification_type) {
        insert_skip_row(repo, &req, "channel disabled by company settings").await?;
        debug!(
            channel = ?req.channel,
            notification_type = ?notification_type,
            recipient_id = %req.recipient_id,
            "Notification skipped: channel disabled"
        );
        return Ok(EnqueueOutcome::Skipped(SkipReason::ChannelDisabled));
    }

    if req.recipient_address.is_none() {
        insert_skip_row(repo, &req, "recipient has no contact for this channel").await?;
        debug!(
            channel = ?req.channel,
            recipient_id = %req.recipient_id,
            "Notification skipped: missing contact"
        );
        return Ok(EnqueueOutcome::Skipped(SkipReason::MissingContact));
    }

    let inserted = repo
        .insert(NewNotification {
            company_id: req.company_id,
            recipient_type: req.recipient_type,
            recipient_id: req.recipient_id,
            channel: req.channel,
            recipient_address: req.recipient_address,
            payload: req.payload,
            dedupe_key: req.dedupe_key,
            status: QueueStatus::Pending,
            last_error: None,
            scheduled_at: req.scheduled_at,
        })
        .await?;

    Ok(match inserted {
        Some(item) => EnqueueOutcome::Queued(item.id),
        None => EnqueueOutcome::Skipped(SkipReason::Duplicate),
    })
}

/// Terminal audit row for a deliberate non-delivery. Shares the dedupe key
/// with the would-be delivery so producer re-runs don't stack skip rows.
async fn insert_skip_row(
    repo: &NotificationRepository,
    req: &EnqueueRequest,
    reason: &str,
) -> JobsResult<()> {
    repo.insert(NewNotification {
        company_id: req.company_id.clone(),
        recipient_type: req.recipient_type,
        recipient_id: req.recipient_id.clone(),
        channel: req.channel,
        recipient_address: req.recipient_address.clone(),
        payload: req.payload.clone(),
        dedupe_key: req.dedupe_key.clone(),
        status: QueueStatus::Skipped,
        last_error: Some(reason.to_string()),
        scheduled_at: req.scheduled_at,
    })
    .await?;
    Ok(())
}

/// Fans one payload out to a tenant on every channel.
pub async fn fan_out_to_tenant(
    repo: &NotificationRepository,
    settings: &NotificationSettings,
    tenant: &Tenant,
    payload: &NotificationPayload,
    dedupe_key: Option<&str>,
    scheduled_at: DateTime<Utc>,
) -> JobsResult<FanOutReport> {
    let mut report = FanOutReport::default();
    for channel in Channel::ALL {
        let outcome = enqueue(
            repo,
            settings,
            EnqueueRequest {
                company_id: tenant.company_id.clone(),
                recipient_type: RecipientType::Tenant,
                recipient_id: tenant.id.clone(),
                channel,
                recipient_address: tenant_contact(tenant, channel),
                payload: payload.clone(),
                dedupe_key: dedupe_key.map(String::from),
                scheduled_at,
            },
        )
        .await?;
        report.absorb(&outcome);
    }
    Ok(report)
}

// =============================================================================
// Event Producers
// =============================================================================

/// Queues the payment confirmation for a freshly recorded payment.
///
/// Keyed on the payment id, so a retried `recordPayment` call (which makes
/// a new payment row) notifies again while a queue-level re-run does not.
pub async fn notify_payment_confirmed(
    repo: &NotificationRepository,
    settings: &NotificationSettings,
    tenant: &Tenant,
    billing: &Billing,
    payment: &Payment,
) -> JobsResult<FanOutReport> {
    let payload = NotificationPayload::PaymentConfirmed {
        billing_id: billing.id.clone(),
        billing_month: billing.billing_month.clone(),
        amount_minor: payment.amount_minor,
        remaining_minor: billing.remaining().minor(),
        paid_on: payment.paid_on,
    };
    let dedupe_key = format!("payment:{}:confirmed", payment.id);
    fan_out_to_tenant(repo, settings, tenant, &payload, Some(&dedupe_key), Utc::now()).await
}

/// Queues the review verdict for a tenant meter submission.
pub async fn notify_submission_reviewed(
    repo: &NotificationRepository,
    settings: &NotificationSettings,
    tenant: &Tenant,
    submission_id: &str,
    fee_name: &str,
    approved: bool,
    reason: Option<String>,
) -> JobsResult<FanOutReport> {
    let payload = NotificationPayload::SubmissionReviewed {
        submission_id: submission_id.to_string(),
        fee_name: fee_name.to_string(),
        approved,
        reason,
    };
    let verdict = if approved { "approved" } else { "rejected" };
    let dedupe_key = format!("submission:{submission_id}:{verdict}");
    fan_out_to_tenant(repo, settings, tenant, &payload, Some(&dedupe_key), Utc::now()).await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use haven_core::NotificationType;
    use haven_db::{Database, DbConfig};

    async fn repo() -> (Database, NotificationRepository) {
        let db = Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory db");
        let repo = db.notifications();
        (db, repo)
    }

    fn tenant(email: Option<&str>, phone: Option<&str>) -> Tenant {
        Tenant {
            id: "t-1".into(),
            company_id: "c-1".into(),
            name: "Tanaka".into(),
            email: email.map(String::from),
            phone: phone.map(String::from),
            created_at: Utc::now(),
        }
    }

    fn announcement() -> NotificationPayload {
        NotificationPayload::Announcement {
            title: "Water outage".into(),
            body: "Maintenance on Friday morning.".into(),
        }
    }

    fn all_enabled() -> NotificationSettings {
        NotificationSettings::new("c-1", "Test PM", None, [])
    }

    #[tokio::test]
    async fn test_enqueue_inserts_pending_row() {
        let (_db, repo) = repo().await;

        let outcome = enqueue(
            &repo,
            &all_enabled(),
            EnqueueRequest {
                company_id: "c-1".into(),
                recipient_type: RecipientType::Tenant,
                recipient_id: "t-1".into(),
                channel: Channel::Email,
                recipient_address: Some("tanaka@example.com".into()),
                payload: announcement(),
                dedupe_key: None,
                scheduled_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let EnqueueOutcome::Queued(id) = outcome else {
            panic!("expected queued, got {outcome:?}");
        };
        let item = repo.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.recipient_address.as_deref(), Some("tanaka@example.com"));
    }

    #[tokio::test]
    async fn test_disabled_channel_leaves_skip_audit_row() {
        let (_db, repo) = repo().await;
        let settings = NotificationSettings::new(
            "c-1",
            "Test PM",
            None,
            [(Channel::Email, NotificationType::Announcement, false)],
        );

        let outcome = enqueue(
            &repo,
            &settings,
            EnqueueRequest {
                company_id: "c-1".into(),
                recipient_type: RecipientType::Tenant,
                recipient_id: "t-1".into(),
                channel: Channel::Email,
                recipient_address: Some("tanaka@example.com".into()),
                payload: announcement(),
                dedupe_key: None,
                scheduled_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, EnqueueOutcome::Skipped(SkipReason::ChannelDisabled));

        let rows = repo
            .list_for_company("c-1", Some(QueueStatus::Skipped))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("disabled"));
        assert_eq!(repo.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_skips_missing_contact_per_channel() {
        let (_db, repo) = repo().await;
        let tenant = tenant(Some("tanaka@example.com"), None);

        let report = fan_out_to_tenant(
            &repo,
            &all_enabled(),
            &tenant,
            &announcement(),
            Some("announce:1"),
            Utc::now(),
        )
        .await
        .unwrap();

        // Email queued, SMS skipped for missing phone
        assert_eq!(report, FanOutReport { queued: 1, skipped: 1 });

        let skipped = repo
            .list_for_company("c-1", Some(QueueStatus::Skipped))
            .await
            .unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].channel, Channel::Sms);
    }

    #[tokio::test]
    async fn test_fan_out_rerun_is_absorbed_by_dedupe() {
        let (_db, repo) = repo().await;
        let tenant = tenant(Some("tanaka@example.com"), Some("+81-90-0000-0000"));

        let first = fan_out_to_tenant(
            &repo,
            &all_enabled(),
            &tenant,
            &announcement(),
            Some("announce:1"),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(first, FanOutReport { queued: 2, skipped: 0 });

        let second = fan_out_to_tenant(
            &repo,
            &all_enabled(),
            &tenant,
            &announcement(),
            Some("announce:1"),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(second, FanOutReport { queued: 0, skipped: 2 });
        assert_eq!(repo.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_payment_confirmed_keyed_on_payment_id() {
        let (_db, repo) = repo().await;
        let tenant = tenant(Some("tanaka@example.com"), None);
        let now = Utc::now();

        let billing = Billing {
            id: "b-1".into(),
            company_id: "c-1".into(),
            tenant_id: "t-1".into(),
            unit_id: "u-1".into(),
            lease_id: "l-1".into(),
            billing_month: "2026-03".into(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            subtotal_minor: 85_000,
            tax_minor: 8_500,
            total_minor: 93_500,
            paid_minor: 40_000,
            status: haven_core::BillingStatus::Partial,
            created_at: now,
            updated_at: now,
        };
        let payment = Payment {
            id: "p-1".into(),
            billing_id: "b-1".into(),
            amount_minor: 40_000,
            paid_on: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            method: haven_core::PaymentMethod::BankTransfer,
            status: haven_core::PaymentStatus::Completed,
            created_at: now,
        };

        let first = notify_payment_confirmed(&repo, &all_enabled(), &tenant, &billing, &payment)
            .await
            .unwrap();
        // Email queued; SMS skipped for missing phone
        assert_eq!(first, FanOutReport { queued: 1, skipped: 1 });

        let rerun = notify_payment_confirmed(&repo, &all_enabled(), &tenant, &billing, &payment)
            .await
            .unwrap();
        assert_eq!(rerun.queued, 0);
    }
}
