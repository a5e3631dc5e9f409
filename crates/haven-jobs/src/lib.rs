//! # haven-jobs: Scheduled Jobs & Notification Delivery for Haven PMS
//!
//! Every batch entry point of the billing pipeline lives here: monthly
//! billing issuance, the daily date-driven triggers, and the queue drain
//! worker that performs the actual sends.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Haven PMS Jobs Layer (THIS CRATE)                     │
//! │                                                                         │
//! │  scheduler (cron / API hook)                                            │
//! │       │                                                                 │
//! │       ├──► issuance::run_monthly_issuance      one billing per lease    │
//! │       ├──► triggers::run_billing_reminders     due in 7 / 3 days        │
//! │       ├──► triggers::run_lease_expiry          ending in 30 / 14 / 7    │
//! │       ├──► triggers::run_overdue_sweep         past due → overdue       │
//! │       │         │                                                       │
//! │       │         └──► notify::enqueue           rules, contacts, dedupe  │
//! │       │                    │                                            │
//! │       │                    ▼                                            │
//! │       │            notification_queue (durable, at-least-once)          │
//! │       │                    │                                            │
//! │       └──► worker::DrainWorker::drain ◄────────┘                        │
//! │                    │                                                    │
//! │                    └──► channel::ChannelSender  (SMTP / SMS gateway)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//! - **At-least-once**: a crash between send and mark re-delivers; nothing
//!   is silently lost.
//! - **Idempotent producers**: dedupe keys absorb trigger re-runs; the
//!   (lease, month) constraint absorbs issuance re-runs.
//! - **Skips are not failures**: disabled channels and missing contacts
//!   become terminal `skipped` audit rows.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod channel;
pub mod config;
pub mod error;
pub mod issuance;
pub mod notify;
pub mod render;
pub mod triggers;
pub mod worker;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use channel::{ChannelError, ChannelSender, HttpSmsSender, SmsConfig, SmtpConfig, SmtpEmailSender};
pub use config::JobsConfig;
pub use error::{JobsError, JobsResult};
pub use issuance::{run_monthly_issuance, IssuanceReport};
pub use notify::{
    enqueue, fan_out_to_tenant, notify_payment_confirmed, notify_submission_reviewed,
    EnqueueRequest, FanOutReport,
};
pub use render::{render, RenderedNotification};
pub use triggers::{
    run_billing_reminders, run_lease_expiry, run_overdue_sweep, TriggerReport,
};
pub use worker::{DrainReport, DrainWorker};
