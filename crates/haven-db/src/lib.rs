//! # haven-db: Database Layer for Haven PMS
//!
//! This crate provides database access for the Haven billing pipeline.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Haven PMS Data Flow                              │
//! │                                                                         │
//! │  API handler / job run (record_payment, drain, sweep)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     haven-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (billing.rs,  │    │  (embedded)  │  │   │
//! │  │   │               │    │  meter.rs,    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  notification │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │  .rs, ...)    │    │ 002_notif... │  │   │
//! │  │   │ Management    │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL mode, foreign keys on)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use haven_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/haven.db")).await?;
//! let billing = db.billings().get_details("b-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::billing::{BillingRepository, NewBilling};
pub use repository::company::CompanyRepository;
pub use repository::fee::FeeRepository;
pub use repository::lease::LeaseRepository;
pub use repository::meter::MeterRepository;
pub use repository::notification::{NewNotification, NotificationRepository};
