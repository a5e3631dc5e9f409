//! # Drain Worker
//!
//! One drain run: release stale claims, claim a batch, deliver each item,
//! record the outcome.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  drain()                                                                │
//! │    │                                                                    │
//! │    ├─► release_stale(now - in_flight_max)   crashed-worker recovery     │
//! │    │                                                                    │
//! │    ├─► claim_batch(now, batch_size)         pending → sending (CAS)     │
//! │    │                                                                    │
//! │    └─► per item:                                                        │
//! │          parse payload ── bad ──────────────► mark_failed               │
//! │          find sender / address ── none ─────► mark_failed               │
//! │          send                                                           │
//! │            ok ──────────────────────────────► mark_sent                 │
//! │            transient, attempts left ────────► mark_retry (backoff)      │
//! │            transient, exhausted │ permanent ► mark_failed               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One item's failure never aborts the run; a whole-run error only comes
//! from the queue storage itself.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

use haven_core::{Channel, NotificationQueueItem};
use haven_db::Database;

use crate::channel::ChannelSender;
use crate::config::JobsConfig;
use crate::error::JobsResult;
use crate::render::render;

/// Tally of one drain run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DrainReport {
    /// Stale `sending` claims returned to `pending`.
    pub released: u64,
    /// Items claimed this run.
    pub claimed: u64,
    pub sent: u64,
    pub retried: u64,
    pub failed: u64,
}

/// Claims and delivers queued notifications.
pub struct DrainWorker {
    db: Database,
    config: JobsConfig,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
}

impl DrainWorker {
    /// A sender may be absent for a channel (e.g. no SMS gateway
    /// configured); its items fail with an explicit error instead of
    /// sitting in the queue forever.
    pub fn new(db: Database, config: JobsConfig, senders: Vec<Arc<dyn ChannelSender>>) -> Self {
        let senders = senders.into_iter().map(|s| (s.channel(), s)).collect();
        DrainWorker {
            db,
            config,
            senders,
        }
    }

    /// Runs one drain pass. Safe to invoke concurrently: the claim is
    /// exclusive, so two overlapping drains split the queue between them.
    pub async fn drain(&self) -> JobsResult<DrainReport> {
        let repo = self.db.notifications();
        let now = Utc::now();
        let mut report = DrainReport::default();

        let cutoff = now - ChronoDuration::seconds(self.config.in_flight_max_secs);
        report.released = repo.release_stale(cutoff).await?;
        if report.released > 0 {
            warn!(
                released = report.released,
                "Released stale notification claims"
            );
        }

        let batch = repo.claim_batch(now, self.config.batch_size).await?;
        report.claimed = batch.len() as u64;

        for item in batch {
            match self.deliver(&item).await {
                ItemOutcome::Sent => {
                    repo.mark_sent(&item.id, Utc::now()).await?;
                    report.sent += 1;
                }
                ItemOutcome::Retry(error) => {
                    let delay = self.config.backoff_delay(item.attempts);
                    let next = Utc::now()
                        + ChronoDuration::from_std(delay)
                            .unwrap_or_else(|_| ChronoDuration::seconds(3600));
                    debug!(
                        item_id = %item.id,
                        attempts = item.attempts + 1,
                        retry_at = %next,
                        error = %error,
                        "Notification send failed, will retry"
                    );
                    repo.mark_retry(&item.id, &error, next).await?;
                    report.retried += 1;
                }
                ItemOutcome::Fail(error) => {
                    warn!(
                        item_id = %item.id,
                        attempts = item.attempts + 1,
                        error = %error,
                        "Notification failed permanently"
                    );
                    repo.mark_failed(&item.id, &error).await?;
                    report.failed += 1;
                }
            }
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                "Drain run complete"
            );
        }

        Ok(report)
    }

    async fn deliver(&self, item: &NotificationQueueItem) -> ItemOutcome {
        let payload = match item.parsed_payload() {
            Ok(payload) => payload,
            Err(err) => return ItemOutcome::Fail(format!("unparseable payload: {err}")),
        };

        let Some(sender) = self.senders.get(&item.channel) else {
            return ItemOutcome::Fail(format!("no sender configured for {:?}", item.channel));
        };

        if item.recipient_address.is_none() {
            // Pending rows always carry an address; a bare one is corrupt.
            return ItemOutcome::Fail("queue item has no recipient address".into());
        }

        let rendered = render(&payload, item.channel);
        match sender.send(item, &rendered).await {
            Ok(()) => ItemOutcome::Sent,
            Err(err) if err.is_transient() && item.attempts + 1 < self.config.max_attempts => {
                ItemOutcome::Retry(err.to_string())
            }
            Err(err) => ItemOutcome::Fail(err.to_string()),
        }
    }
}

enum ItemOutcome {
    Sent,
    Retry(String),
    Fail(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use haven_core::{
        EnqueueOutcome, NotificationPayload, NotificationSettings, QueueStatus, RecipientType,
    };
    use haven_db::{DbConfig, NewNotification};

    use crate::channel::ChannelError;

    /// Records sends and fails on demand.
    struct MockSender {
        channel: Channel,
        sent_to: Mutex<Vec<String>>,
        /// Scripted results popped per send; empty means success.
        script: Mutex<Vec<Result<(), ChannelError>>>,
    }

    impl MockSender {
        fn ok(channel: Channel) -> Arc<Self> {
            Arc::new(MockSender {
                channel,
                sent_to: Mutex::new(Vec::new()),
                script: Mutex::new(Vec::new()),
            })
        }

        fn scripted(channel: Channel, script: Vec<Result<(), ChannelError>>) -> Arc<Self> {
            Arc::new(MockSender {
                channel,
                sent_to: Mutex::new(Vec::new()),
                script: Mutex::new(script),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent_to.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelSender for MockSender {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(
            &self,
            item: &NotificationQueueItem,
            _rendered: &crate::render::RenderedNotification,
        ) -> Result<(), ChannelError> {
            let scripted = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Ok(())
                } else {
                    script.remove(0)
                }
            };
            if scripted.is_ok() {
                self.sent_to
                    .lock()
                    .unwrap()
                    .push(item.recipient_address.clone().unwrap_or_default());
            }
            scripted
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory db")
    }

    fn fast_config() -> JobsConfig {
        JobsConfig {
            initial_backoff_secs: 0,
            max_backoff_secs: 0,
            ..JobsConfig::default()
        }
    }

    async fn enqueue_announcement(db: &Database, channel: Channel, address: &str) -> String {
        let item = db
            .notifications()
            .insert(NewNotification {
                company_id: "c-1".into(),
                recipient_type: RecipientType::Tenant,
                recipient_id: "t-1".into(),
                channel,
                recipient_address: Some(address.into()),
                payload: NotificationPayload::Announcement {
                    title: "Test".into(),
                    body: "Body".into(),
                },
                dedupe_key: None,
                status: QueueStatus::Pending,
                last_error: None,
                scheduled_at: Utc::now(),
            })
            .await
            .unwrap()
            .unwrap();
        item.id
    }

    #[tokio::test]
    async fn test_drain_sends_and_marks_sent() {
        let db = db().await;
        let id = enqueue_announcement(&db, Channel::Email, "tanaka@example.com").await;

        let email = MockSender::ok(Channel::Email);
        let worker = DrainWorker::new(db.clone(), JobsConfig::default(), vec![email.clone()]);

        let report = worker.drain().await.unwrap();
        assert_eq!(report.claimed, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(email.sent(), vec!["tanaka@example.com".to_string()]);

        let item = db.notifications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Sent);
        assert_eq!(item.attempts, 1);
        assert!(item.sent_at.is_some());

        // Nothing left; a second drain is a no-op
        let report = worker.drain().await.unwrap();
        assert_eq!(report.claimed, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        let db = db().await;
        let id = enqueue_announcement(&db, Channel::Email, "tanaka@example.com").await;

        let email = MockSender::scripted(
            Channel::Email,
            vec![Err(ChannelError::Transient("connection reset".into()))],
        );
        // Zero backoff so the retried item is immediately claimable
        let worker = DrainWorker::new(db.clone(), fast_config(), vec![email.clone()]);

        let report = worker.drain().await.unwrap();
        assert_eq!(report.retried, 1);

        let item = db.notifications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.attempts, 1);
        assert!(item.last_error.as_deref().unwrap().contains("connection reset"));

        let report = worker.drain().await.unwrap();
        assert_eq!(report.sent, 1);

        let item = db.notifications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Sent);
        assert_eq!(item.attempts, 2);
        assert!(item.last_error.is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure_fails_immediately() {
        let db = db().await;
        let id = enqueue_announcement(&db, Channel::Email, "bad@").await;

        let email = MockSender::scripted(
            Channel::Email,
            vec![Err(ChannelError::Permanent("address rejected".into()))],
        );
        let worker = DrainWorker::new(db.clone(), JobsConfig::default(), vec![email]);

        let report = worker.drain().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.retried, 0);

        let item = db.notifications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_exhaust_into_failed() {
        let db = db().await;
        let id = enqueue_announcement(&db, Channel::Email, "tanaka@example.com").await;

        let email = MockSender::scripted(
            Channel::Email,
            (0..5)
                .map(|_| Err(ChannelError::Transient("timeout".into())))
                .collect(),
        );
        let config = JobsConfig {
            max_attempts: 3,
            ..fast_config()
        };
        let worker = DrainWorker::new(db.clone(), config, vec![email]);

        // Attempts 1 and 2 retry, attempt 3 hits the cutoff and fails
        assert_eq!(worker.drain().await.unwrap().retried, 1);
        assert_eq!(worker.drain().await.unwrap().retried, 1);
        let last = worker.drain().await.unwrap();
        assert_eq!(last.retried, 0);
        assert_eq!(last.failed, 1);

        let item = db.notifications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.attempts, 3);
    }

    #[tokio::test]
    async fn test_missing_sender_fails_item() {
        let db = db().await;
        let id = enqueue_announcement(&db, Channel::Sms, "+81-90-0000-0000").await;

        // Only an email sender configured
        let worker = DrainWorker::new(
            db.clone(),
            JobsConfig::default(),
            vec![MockSender::ok(Channel::Email)],
        );

        let report = worker.drain().await.unwrap();
        assert_eq!(report.failed, 1);

        let item = db.notifications().get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert!(item.last_error.as_deref().unwrap().contains("no sender"));
    }

    #[tokio::test]
    async fn test_skipped_rows_never_claimed() {
        let db = db().await;
        let repo = db.notifications();

        let settings = NotificationSettings::new("c-1", "Test PM", None, []);
        let outcome = crate::notify::enqueue(
            &repo,
            &settings,
            crate::notify::EnqueueRequest {
                company_id: "c-1".into(),
                recipient_type: RecipientType::Tenant,
                recipient_id: "t-1".into(),
                channel: Channel::Email,
                recipient_address: None,
                payload: NotificationPayload::Announcement {
                    title: "Test".into(),
                    body: "Body".into(),
                },
                dedupe_key: None,
                scheduled_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Skipped(_)));

        let worker = DrainWorker::new(
            db.clone(),
            JobsConfig::default(),
            vec![MockSender::ok(Channel::Email)],
        );
        let report = worker.drain().await.unwrap();
        assert_eq!(report.claimed, 0);
    }
}
