//! # haven-core: Pure Business Logic for Haven PMS
//!
//! This crate is the **heart** of the billing pipeline. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Haven PMS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/haven-api (axum)                        │   │
//! │  │   recordPayment, cancelBilling, approveSubmission, job hooks    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            haven-jobs (issuance, triggers, drain worker)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ haven-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐  │   │
//! │  │   │   fees    │  │  billing  │  │ metering  │  │notification│  │   │
//! │  │   │calculator │  │  status   │  │ workflow  │  │  payloads  │  │   │
//! │  │   │           │  │  machine  │  │  rules    │  │  settings  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    haven-db (SQLite layer)                      │   │
//! │  │          sqlx queries, migrations, repositories                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (FeeType, Billing, MeterReading, Lease, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`fees`] - The fee calculator (§ fixed / per_sqm / metered / custom)
//! - [`billing`] - Billing payment-status state machine
//! - [`metering`] - Tenant meter submission workflow rules
//! - [`notification`] - Notification payloads, queue item, settings
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic - same input =
//!    same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are i64 minor units
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod fees;
pub mod metering;
pub mod money;
pub mod notification;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use haven_core::Money` instead of
// `use haven_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use notification::{
    Channel, EnqueueOutcome, NotificationPayload, NotificationQueueItem, NotificationSettings,
    NotificationType, QueueStatus, RecipientType, SkipReason,
};
pub use types::*;
