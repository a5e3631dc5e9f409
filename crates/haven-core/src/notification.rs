//! # Notification Model
//!
//! Types for the durable notification queue: channels, notification types,
//! the strongly-typed template payload union, queue items and per-company
//! settings.
//!
//! ## Payload Design
//! Template data is a tagged union keyed by notification type — each
//! variant carries its own typed field set, so a missing template field is
//! a construction-time error, not a runtime hole in a key-value bag.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Channels & Types
// =============================================================================

/// Outbound delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    /// All channels a producer fans out to.
    pub const ALL: [Channel; 2] = [Channel::Email, Channel::Sms];
}

/// Who a queue item is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    Tenant,
    Staff,
}

/// The kind of event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BillingIssued,
    PaymentReminder,
    OverdueNotice,
    PaymentConfirmed,
    LeaseExpiring,
    SubmissionReviewed,
    Announcement,
}

/// Lifecycle state of a queue item.
///
/// `sending` is the claimed state between `pending` and a terminal state:
/// the worker claims an item (CAS out of `pending`) before performing the
/// side-effecting send, so a crash mid-send leaves a claimed item that the
/// staleness release returns to `pending` — never a silent duplicate send
/// of an item that already reached `sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Awaiting delivery (or re-delivery after a transient failure).
    Pending,
    /// Claimed by a drain worker; send in flight.
    Sending,
    /// Delivered. Terminal; never re-delivered.
    Sent,
    /// Retries exhausted. Terminal.
    Failed,
    /// Deliberate non-delivery (disabled channel / missing contact).
    /// Terminal, and explicitly not a failure.
    Skipped,
}

// =============================================================================
// Template Payloads
// =============================================================================

/// Strongly-typed template data, one variant per notification type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    BillingIssued {
        billing_id: String,
        billing_month: String,
        total_minor: i64,
        #[ts(as = "String")]
        due_date: NaiveDate,
    },
    PaymentReminder {
        billing_id: String,
        billing_month: String,
        remaining_minor: i64,
        #[ts(as = "String")]
        due_date: NaiveDate,
        days_until_due: i64,
    },
    OverdueNotice {
        billing_id: String,
        billing_month: String,
        remaining_minor: i64,
        #[ts(as = "String")]
        due_date: NaiveDate,
    },
    PaymentConfirmed {
        billing_id: String,
        billing_month: String,
        amount_minor: i64,
        remaining_minor: i64,
        #[ts(as = "String")]
        paid_on: NaiveDate,
    },
    LeaseExpiring {
        lease_id: String,
        unit_name: String,
        #[ts(as = "String")]
        end_date: NaiveDate,
        days_remaining: i64,
    },
    SubmissionReviewed {
        submission_id: String,
        fee_name: String,
        approved: bool,
        reason: Option<String>,
    },
    Announcement {
        title: String,
        body: String,
    },
}

impl NotificationPayload {
    /// The notification type this payload belongs to.
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationPayload::BillingIssued { .. } => NotificationType::BillingIssued,
            NotificationPayload::PaymentReminder { .. } => NotificationType::PaymentReminder,
            NotificationPayload::OverdueNotice { .. } => NotificationType::OverdueNotice,
            NotificationPayload::PaymentConfirmed { .. } => NotificationType::PaymentConfirmed,
            NotificationPayload::LeaseExpiring { .. } => NotificationType::LeaseExpiring,
            NotificationPayload::SubmissionReviewed { .. } => NotificationType::SubmissionReviewed,
            NotificationPayload::Announcement { .. } => NotificationType::Announcement,
        }
    }
}

// =============================================================================
// Queue Item
// =============================================================================

/// A durable unit of outbound notification work.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct NotificationQueueItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning company.
    pub company_id: String,

    /// Recipient kind.
    pub recipient_type: RecipientType,

    /// Recipient entity id.
    pub recipient_id: String,

    /// Event kind.
    pub notification_type: NotificationType,

    /// Delivery channel.
    pub channel: Channel,

    /// Destination address/number snapshot taken at enqueue time.
    pub recipient_address: Option<String>,

    /// Serialized [`NotificationPayload`] (JSON).
    pub payload: String,

    /// Producer idempotence key; unique per channel when present.
    pub dedupe_key: Option<String>,

    /// Lifecycle state.
    pub status: QueueStatus,

    /// Delivery attempts so far.
    pub attempts: i64,

    /// Error message from the last failed attempt.
    pub last_error: Option<String>,

    /// Earliest time the item may be delivered.
    #[ts(as = "String")]
    pub scheduled_at: DateTime<Utc>,

    /// When the current claim was taken, while `sending`.
    #[ts(as = "String")]
    pub claimed_at: Option<DateTime<Utc>>,

    /// When delivery succeeded.
    #[ts(as = "String")]
    pub sent_at: Option<DateTime<Utc>>,

    /// When the item was enqueued.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl NotificationQueueItem {
    /// Deserializes the template payload.
    pub fn parsed_payload(&self) -> serde_json::Result<NotificationPayload> {
        serde_json::from_str(&self.payload)
    }
}

// =============================================================================
// Enqueue Outcome
// =============================================================================

/// Why an enqueue was skipped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The company disabled this (channel, type) pair.
    ChannelDisabled,
    /// The recipient has no address/number for the channel.
    MissingContact,
    /// An item with the same dedupe key already exists (idempotent re-run).
    Duplicate,
}

/// Result of `enqueue`: queued, or skipped with a reason. Storage and
/// validation failures surface as errors separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A pending queue row was created; its id.
    Queued(String),
    /// Deliberate non-enqueue.
    Skipped(SkipReason),
}

impl EnqueueOutcome {
    #[inline]
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued(_))
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Per-company notification configuration: an immutable snapshot for the
/// duration of one producer run. Never mutated by the pipeline itself.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub company_id: String,

    /// Sender display name on outbound email.
    pub sender_name: String,

    /// Sender address on outbound email; falls back to the global sender
    /// when unset.
    pub sender_email: Option<String>,

    /// Per (channel, type) toggles. Pairs absent from the map are enabled.
    rules: HashMap<(Channel, NotificationType), bool>,
}

impl NotificationSettings {
    /// Creates a settings snapshot. `rules` lists only the explicitly
    /// configured pairs.
    pub fn new(
        company_id: impl Into<String>,
        sender_name: impl Into<String>,
        sender_email: Option<String>,
        rules: impl IntoIterator<Item = (Channel, NotificationType, bool)>,
    ) -> Self {
        NotificationSettings {
            company_id: company_id.into(),
            sender_name: sender_name.into(),
            sender_email,
            rules: rules
                .into_iter()
                .map(|(c, t, enabled)| ((c, t), enabled))
                .collect(),
        }
    }

    /// Whether the company wants this (channel, type) pair delivered.
    /// Unconfigured pairs default to enabled.
    pub fn is_enabled(&self, channel: Channel, notification_type: NotificationType) -> bool {
        self.rules
            .get(&(channel, notification_type))
            .copied()
            .unwrap_or(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trips_with_type_tag() {
        let payload = NotificationPayload::PaymentReminder {
            billing_id: "b-1".into(),
            billing_month: "2026-03".into(),
            remaining_minor: 60_000,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            days_until_due: 7,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""type":"payment_reminder""#));

        let parsed: NotificationPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.notification_type(), NotificationType::PaymentReminder);
    }

    #[test]
    fn test_payload_type_mapping_is_total() {
        let lease = NotificationPayload::LeaseExpiring {
            lease_id: "l-1".into(),
            unit_name: "203".into(),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
            days_remaining: 30,
        };
        assert_eq!(lease.notification_type(), NotificationType::LeaseExpiring);

        let announce = NotificationPayload::Announcement {
            title: "Elevator maintenance".into(),
            body: "Out of service Tuesday morning.".into(),
        };
        assert_eq!(announce.notification_type(), NotificationType::Announcement);
    }

    #[test]
    fn test_settings_default_enabled() {
        let settings = NotificationSettings::new(
            "c-1",
            "Haven Property Management",
            None,
            [(Channel::Email, NotificationType::PaymentReminder, false)],
        );

        // Explicitly disabled pair
        assert!(!settings.is_enabled(Channel::Email, NotificationType::PaymentReminder));
        // Unconfigured pairs default to enabled
        assert!(settings.is_enabled(Channel::Sms, NotificationType::PaymentReminder));
        assert!(settings.is_enabled(Channel::Email, NotificationType::BillingIssued));
    }

    #[test]
    fn test_enqueue_outcome() {
        assert!(EnqueueOutcome::Queued("n-1".into()).is_queued());
        assert!(!EnqueueOutcome::Skipped(SkipReason::ChannelDisabled).is_queued());
    }
}
