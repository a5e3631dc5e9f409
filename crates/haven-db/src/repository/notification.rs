//! # Notification Queue Repository
//!
//! Database operations for the durable notification queue and per-company
//! notification settings.
//!
//! ## Claim Protocol (at-least-once)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  drain worker                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  release_stale(cutoff)      ← sending rows whose claim aged out go      │
//! │       │                       back to pending (crashed worker)          │
//! │       ▼                                                                 │
//! │  claim_batch(now, n)        ← UPDATE pending → sending ... RETURNING    │
//! │       │                       (single statement, atomic under SQLite)   │
//! │       ▼                                                                 │
//! │  send via channel ──► mark_sent / mark_retry / mark_failed              │
//! │                                                                         │
//! │  A crash after send but before mark_sent re-delivers on the next        │
//! │  drain: duplicates possible, silent loss is not.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use haven_core::{
    Channel, NotificationPayload, NotificationQueueItem, NotificationSettings, NotificationType,
    QueueStatus, RecipientType,
};

/// Field set for a queue row about to be inserted. The repository assigns
/// the id and created_at; the notification type is derived from the payload.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub company_id: String,
    pub recipient_type: RecipientType,
    pub recipient_id: String,
    pub channel: Channel,
    /// Address snapshot; None only on `skipped` rows.
    pub recipient_address: Option<String>,
    pub payload: NotificationPayload,
    /// Producer idempotence key; None for manual one-off notifications.
    pub dedupe_key: Option<String>,
    /// `Pending` for deliverable rows, `Skipped` for audit rows recording
    /// a deliberate non-delivery.
    pub status: QueueStatus,
    /// Skip reason text on `skipped` rows, None otherwise.
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

/// Repository for notification queue operations.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Enqueue
    // -------------------------------------------------------------------------

    /// Inserts a queue row.
    ///
    /// Returns `Ok(None)` when the dedupe key already exists on the channel:
    /// the partial unique index absorbs producer re-runs, so a duplicate is
    /// an expected outcome, not an error.
    pub async fn insert(&self, new: NewNotification) -> DbResult<Option<NotificationQueueItem>> {
        let item = NotificationQueueItem {
            id: Uuid::new_v4().to_string(),
            company_id: new.company_id,
            recipient_type: new.recipient_type,
            recipient_id: new.recipient_id,
            notification_type: new.payload.notification_type(),
            channel: new.channel,
            recipient_address: new.recipient_address,
            payload: serde_json::to_string(&new.payload)?,
            dedupe_key: new.dedupe_key,
            status: new.status,
            attempts: 0,
            last_error: new.last_error,
            scheduled_at: new.scheduled_at,
            claimed_at: None,
            sent_at: None,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO notification_queue (
                id, company_id, recipient_type, recipient_id,
                notification_type, channel, recipient_address, payload,
                dedupe_key, status, attempts, last_error,
                scheduled_at, claimed_at, sent_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&item.id)
        .bind(&item.company_id)
        .bind(item.recipient_type)
        .bind(&item.recipient_id)
        .bind(item.notification_type)
        .bind(item.channel)
        .bind(&item.recipient_address)
        .bind(&item.payload)
        .bind(&item.dedupe_key)
        .bind(item.status)
        .bind(item.attempts)
        .bind(&item.last_error)
        .bind(item.scheduled_at)
        .bind(item.claimed_at)
        .bind(item.sent_at)
        .bind(item.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    id = %item.id,
                    channel = ?item.channel,
                    notification_type = ?item.notification_type,
                    status = ?item.status,
                    "Notification enqueued"
                );
                Ok(Some(item))
            }
            Err(err) => {
                let db_err = DbError::from(err);
                if db_err.is_unique_violation() {
                    Ok(None)
                } else {
                    Err(db_err)
                }
            }
        }
    }

    /// Gets a queue item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<NotificationQueueItem>> {
        let item = sqlx::query_as::<_, NotificationQueueItem>(
            "SELECT * FROM notification_queue WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Lists queue items for a company, optionally filtered by status.
    pub async fn list_for_company(
        &self,
        company_id: &str,
        status: Option<QueueStatus>,
    ) -> DbResult<Vec<NotificationQueueItem>> {
        let items = match status {
            Some(status) => {
                sqlx::query_as::<_, NotificationQueueItem>(
                    r#"
                    SELECT * FROM notification_queue
                    WHERE company_id = ?1 AND status = ?2
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(company_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, NotificationQueueItem>(
                    r#"
                    SELECT * FROM notification_queue
                    WHERE company_id = ?1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(items)
    }

    /// Number of rows currently pending delivery.
    pub async fn pending_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_queue WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Claiming & Outcomes
    // -------------------------------------------------------------------------

    /// Atomically claims up to `batch_size` eligible pending items, oldest
    /// schedule first, moving them to `sending`.
    ///
    /// The claim is a single UPDATE ... RETURNING: two concurrent drains
    /// can never claim the same row.
    pub async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: i64,
    ) -> DbResult<Vec<NotificationQueueItem>> {
        let claimed = sqlx::query_as::<_, NotificationQueueItem>(
            r#"
            UPDATE notification_queue SET
                status = 'sending',
                claimed_at = ?1
            WHERE id IN (
                SELECT id FROM notification_queue
                WHERE status = 'pending' AND scheduled_at <= ?1
                ORDER BY scheduled_at, created_at
                LIMIT ?2
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        if !claimed.is_empty() {
            debug!(count = claimed.len(), "Claimed notification batch");
        }

        Ok(claimed)
    }

    /// Returns `sending` rows claimed before the cutoff to `pending`.
    ///
    /// This is the crash-recovery path: a worker that died mid-send leaves
    /// its claim behind, and the next drain releases it after the in-flight
    /// window expires. Returns the number of rows released.
    pub async fn release_stale(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue SET
                status = 'pending',
                claimed_at = NULL
            WHERE status = 'sending' AND claimed_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks a claimed item delivered.
    pub async fn mark_sent(&self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue SET
                status = 'sent',
                attempts = attempts + 1,
                sent_at = ?2,
                claimed_at = NULL,
                last_error = NULL
            WHERE id = ?1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!("queue item {id} is not claimed")));
        }

        Ok(())
    }

    /// Records a transient failure: back to `pending` with the error and a
    /// backoff-delayed schedule.
    pub async fn mark_retry(
        &self,
        id: &str,
        error: &str,
        next_scheduled_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue SET
                status = 'pending',
                attempts = attempts + 1,
                last_error = ?2,
                scheduled_at = ?3,
                claimed_at = NULL
            WHERE id = ?1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(next_scheduled_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!("queue item {id} is not claimed")));
        }

        Ok(())
    }

    /// Records a terminal failure (retries exhausted or permanent error).
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_queue SET
                status = 'failed',
                attempts = attempts + 1,
                last_error = ?2,
                claimed_at = NULL
            WHERE id = ?1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(format!("queue item {id} is not claimed")));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Loads the settings snapshot for a company. A company with no settings
    /// row gets defaults: every (channel, type) pair enabled, generic sender.
    pub async fn load_settings(&self, company_id: &str) -> DbResult<NotificationSettings> {
        let row: Option<(String, Option<String>)> = sqlx::query_as(
            "SELECT sender_name, sender_email FROM notification_settings WHERE company_id = ?1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        let (sender_name, sender_email) = row.unwrap_or(("Haven PMS".to_string(), None));

        let rules: Vec<(Channel, NotificationType, bool)> = sqlx::query_as(
            r#"
            SELECT channel, notification_type, enabled
            FROM notification_rules
            WHERE company_id = ?1
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(NotificationSettings::new(
            company_id,
            sender_name,
            sender_email,
            rules,
        ))
    }

    /// Creates or updates a company's sender settings.
    pub async fn upsert_settings(
        &self,
        company_id: &str,
        sender_name: &str,
        sender_email: Option<&str>,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO notification_settings (
                company_id, sender_name, sender_email, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (company_id) DO UPDATE SET
                sender_name = excluded.sender_name,
                sender_email = excluded.sender_email,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(company_id)
        .bind(sender_name)
        .bind(sender_email)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets one (channel, notification type) toggle.
    pub async fn set_rule(
        &self,
        company_id: &str,
        channel: Channel,
        notification_type: NotificationType,
        enabled: bool,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_rules (company_id, channel, notification_type, enabled)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (company_id, channel, notification_type) DO UPDATE SET
                enabled = excluded.enabled
            "#,
        )
        .bind(company_id)
        .bind(channel)
        .bind(notification_type)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
