//! # Repository Module
//!
//! Database repository implementations for Haven PMS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  API Handler / Job Run                                                 │
//! │       │                                                                 │
//! │       │  db.billings().record_payment(...)                             │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  BillingRepository                                                     │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── create_billing(&self, draft, items)                               │
//! │  ├── record_payment(&self, ...)    ← CAS on paid_minor                 │
//! │  └── sweep_overdue(&self, today)                                       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • SQL is isolated in one place                                        │
//! │  • Storage-level invariants live next to the queries they guard        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`company::CompanyRepository`] - Companies, units, tenants
//! - [`lease::LeaseRepository`] - Lease lifecycle
//! - [`fee::FeeRepository`] - Fee types and per-unit overrides
//! - [`meter::MeterRepository`] - Meter readings and tenant submissions
//! - [`billing::BillingRepository`] - Billings, items, payments
//! - [`notification::NotificationRepository`] - Durable notification queue

pub mod billing;
pub mod company;
pub mod fee;
pub mod lease;
pub mod meter;
pub mod notification;
