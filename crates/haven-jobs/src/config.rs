//! # Jobs Configuration
//!
//! Tunables for the drain worker and the scheduled triggers. Defaults are
//! production values; tests shrink them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Defaults
// =============================================================================

fn default_batch_size() -> i64 {
    50
}
fn default_max_attempts() -> i64 {
    5
}
fn default_in_flight_max_secs() -> i64 {
    300
}
fn default_initial_backoff_secs() -> u64 {
    60
}
fn default_max_backoff_secs() -> u64 {
    3600
}
fn default_reminder_days() -> Vec<i64> {
    vec![7, 3]
}
fn default_lease_expiry_days() -> Vec<i64> {
    vec![30, 14, 7]
}
fn default_due_in_days() -> i64 {
    20
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the jobs layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Queue items claimed per drain run.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Delivery attempts before an item is marked `failed` for good.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,

    /// Seconds a `sending` claim may age before the next drain releases it
    /// back to `pending` (crashed-worker recovery).
    #[serde(default = "default_in_flight_max_secs")]
    pub in_flight_max_secs: i64,

    /// First retry delay; doubles per attempt.
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    /// Retry delay ceiling.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Days-before-due windows for payment reminders.
    #[serde(default = "default_reminder_days")]
    pub reminder_days: Vec<i64>,

    /// Days-before-end windows for lease expiry notices.
    #[serde(default = "default_lease_expiry_days")]
    pub lease_expiry_days: Vec<i64>,

    /// Days between issue date and due date on issued billings.
    #[serde(default = "default_due_in_days")]
    pub due_in_days: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        JobsConfig {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            in_flight_max_secs: default_in_flight_max_secs(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            reminder_days: default_reminder_days(),
            lease_expiry_days: default_lease_expiry_days(),
            due_in_days: default_due_in_days(),
        }
    }
}

impl JobsConfig {
    /// Retry delay before attempt `attempts + 1`: exponential from the
    /// initial delay, capped at the ceiling.
    pub fn backoff_delay(&self, attempts: i64) -> Duration {
        let exponent = attempts.clamp(0, 32) as u32;
        let secs = self
            .initial_backoff_secs
            .saturating_mul(1u64 << exponent.min(31))
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
