//! HTTP route registration.
//!
//! ```text
//! /health                                    liveness probe
//! /api/*                                     portal operations (identity headers)
//! /internal/jobs/*                           scheduler endpoints (shared secret)
//! ```

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::AppState;

pub mod billing;
pub mod jobs;
pub mod metering;
pub mod notifications;

/// Builds the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Billing & payments
        .route("/api/billings", get(billing::list_billings))
        .route("/api/billings/{id}", get(billing::get_billing))
        .route("/api/billings/{id}/payments", post(billing::record_payment))
        .route(
            "/api/billings/{id}/payments/{payment_id}",
            delete(billing::delete_payment),
        )
        .route("/api/billings/{id}/cancel", post(billing::cancel_billing))
        // Tenant meter submissions
        .route(
            "/api/meter-submissions",
            get(metering::list_pending_submissions).post(metering::create_submission),
        )
        .route(
            "/api/meter-submissions/{id}/approve",
            post(metering::approve_submission),
        )
        .route(
            "/api/meter-submissions/{id}/reject",
            post(metering::reject_submission),
        )
        .route("/api/units/{unit_id}/readings", get(metering::list_unit_readings))
        // Notification queue
        .route(
            "/api/notifications",
            get(notifications::list_notifications).post(notifications::create_announcement),
        )
        .route("/api/notifications/{id}", get(notifications::get_notification))
        // Scheduler endpoints
        .route("/internal/jobs/drain", post(jobs::drain))
        .route("/internal/jobs/issue-billings", post(jobs::issue_billings))
        .route(
            "/internal/jobs/billing-reminders",
            post(jobs::billing_reminders),
        )
        .route("/internal/jobs/lease-expiry", post(jobs::lease_expiry))
        .route("/internal/jobs/overdue-sweep", post(jobs::overdue_sweep))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
