//! Scheduler-invoked job endpoints.
//!
//! Each endpoint runs one job to completion and returns its tally, so the
//! external cron's logs double as a run history. All of them are guarded by
//! the shared-secret extractor and are safe to re-run: the producers dedupe
//! and the sweeps only match rows still in a source state.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use haven_jobs::{
    run_billing_reminders, run_lease_expiry, run_monthly_issuance, run_overdue_sweep, DrainReport,
    IssuanceReport, TriggerReport,
};

use crate::auth::SchedulerAuth;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IssueBillingsRequest {
    /// Billing month to issue ("YYYY-MM"); defaults to the current month.
    pub billing_month: Option<String>,
}

/// POST /internal/jobs/drain
pub async fn drain(
    State(state): State<Arc<AppState>>,
    _auth: SchedulerAuth,
) -> Result<Json<DrainReport>, ApiError> {
    let report = state.worker.drain().await?;
    info!(?report, "Drain run complete");
    Ok(Json(report))
}

/// POST /internal/jobs/issue-billings
pub async fn issue_billings(
    State(state): State<Arc<AppState>>,
    _auth: SchedulerAuth,
    body: Option<Json<IssueBillingsRequest>>,
) -> Result<Json<IssuanceReport>, ApiError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let today = Utc::now().date_naive();
    let billing_month = req
        .billing_month
        .unwrap_or_else(|| today.format("%Y-%m").to_string());

    let report = run_monthly_issuance(&state.db, &state.jobs, &billing_month, today).await?;
    info!(%billing_month, ?report, "Issuance run complete");
    Ok(Json(report))
}

/// POST /internal/jobs/billing-reminders
pub async fn billing_reminders(
    State(state): State<Arc<AppState>>,
    _auth: SchedulerAuth,
) -> Result<Json<TriggerReport>, ApiError> {
    let report = run_billing_reminders(&state.db, &state.jobs, Utc::now().date_naive()).await?;
    info!(?report, "Billing reminder run complete");
    Ok(Json(report))
}

/// POST /internal/jobs/lease-expiry
pub async fn lease_expiry(
    State(state): State<Arc<AppState>>,
    _auth: SchedulerAuth,
) -> Result<Json<TriggerReport>, ApiError> {
    let report = run_lease_expiry(&state.db, &state.jobs, Utc::now().date_naive()).await?;
    info!(?report, "Lease expiry run complete");
    Ok(Json(report))
}

/// POST /internal/jobs/overdue-sweep
pub async fn overdue_sweep(
    State(state): State<Arc<AppState>>,
    _auth: SchedulerAuth,
) -> Result<Json<TriggerReport>, ApiError> {
    let report = run_overdue_sweep(&state.db, Utc::now().date_naive()).await?;
    info!(?report, "Overdue sweep complete");
    Ok(Json(report))
}
