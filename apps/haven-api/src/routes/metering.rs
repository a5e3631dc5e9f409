//! Tenant meter submission handlers.
//!
//! Tenants submit readings from the portal; staff review them. Approval
//! freezes the unit price in force at review time into the materialized
//! reading, so later tariff changes never touch it.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use haven_core::metering::{
    build_approved_reading, ensure_pending, ensure_same_company, resolve_unit_price,
    validate_rejection_reason, validate_submission_value,
};
use haven_core::{MeterReading, TenantMeterSubmission};
use haven_jobs::notify_submission_reviewed;

use crate::auth::{CompanyIdentity, TenantIdentity};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    pub unit_id: String,
    pub fee_type_id: String,
    pub submitted_value: i64,
    pub reading_date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectSubmissionRequest {
    pub reason: String,
}

/// POST /api/meter-submissions
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    identity: TenantIdentity,
    Json(req): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<TenantMeterSubmission>), ApiError> {
    let tenant = state
        .db
        .companies()
        .get_tenant(&identity.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant", &identity.tenant_id))?;

    let previous = state
        .db
        .meters()
        .latest_accepted_value(&req.unit_id, &req.fee_type_id)
        .await?;
    validate_submission_value(req.submitted_value, previous)?;

    let submission = state
        .db
        .meters()
        .create_submission(
            &tenant.company_id,
            &tenant.id,
            &req.unit_id,
            &req.fee_type_id,
            req.submitted_value,
            req.reading_date,
            req.note.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(submission)))
}

/// GET /api/meter-submissions
pub async fn list_pending_submissions(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
) -> Result<Json<Vec<TenantMeterSubmission>>, ApiError> {
    let submissions = state
        .db
        .meters()
        .list_pending_for_company(&identity.company_id)
        .await?;
    Ok(Json(submissions))
}

/// POST /api/meter-submissions/{id}/approve
pub async fn approve_submission(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(id): Path<String>,
) -> Result<Json<MeterReading>, ApiError> {
    let meters = state.db.meters();
    let fees = state.db.fees();

    let submission = meters
        .get_submission(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Submission", &id))?;
    ensure_same_company(&submission.company_id, &identity.company_id)?;

    let fee_type = fees
        .get_fee_type(&submission.fee_type_id)
        .await?
        .ok_or_else(|| ApiError::not_found("FeeType", &submission.fee_type_id))?;
    let fee_override = fees
        .get_override(&submission.unit_id, &submission.fee_type_id)
        .await?;
    let unit_price = resolve_unit_price(&fee_type, fee_override.as_ref());

    let previous = meters
        .latest_accepted_value(&submission.unit_id, &submission.fee_type_id)
        .await?;
    let new_reading = build_approved_reading(&submission, previous, unit_price, &identity.staff_id)?;
    let reading = meters
        .approve_submission(&id, &new_reading, &identity.staff_id)
        .await?;

    queue_review_verdict(&state, &submission, &fee_type.name, true, None).await;

    Ok(Json(reading))
}

/// POST /api/meter-submissions/{id}/reject
pub async fn reject_submission(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(id): Path<String>,
    Json(req): Json<RejectSubmissionRequest>,
) -> Result<StatusCode, ApiError> {
    validate_rejection_reason(&req.reason)?;

    let meters = state.db.meters();
    let submission = meters
        .get_submission(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Submission", &id))?;
    ensure_same_company(&submission.company_id, &identity.company_id)?;
    ensure_pending(&submission, "reject")?;

    meters
        .reject_submission(&id, &req.reason, &identity.staff_id)
        .await?;

    let fee_name = state
        .db
        .fees()
        .get_fee_type(&submission.fee_type_id)
        .await?
        .map(|f| f.name)
        .unwrap_or_else(|| submission.fee_type_id.clone());
    queue_review_verdict(&state, &submission, &fee_name, false, Some(req.reason)).await;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/units/{unit_id}/readings
pub async fn list_unit_readings(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(unit_id): Path<String>,
) -> Result<Json<Vec<MeterReading>>, ApiError> {
    let unit = state
        .db
        .companies()
        .get_unit(&unit_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Unit", &unit_id))?;
    if unit.company_id != identity.company_id {
        return Err(ApiError::not_found("Unit", &unit_id));
    }

    let readings = state.db.meters().list_readings_for_unit(&unit_id).await?;
    Ok(Json(readings))
}

/// The review verdict is committed; a notification hiccup must not undo it.
async fn queue_review_verdict(
    state: &AppState,
    submission: &TenantMeterSubmission,
    fee_name: &str,
    approved: bool,
    reason: Option<String>,
) {
    let result = async {
        let tenant = state
            .db
            .companies()
            .get_tenant(&submission.tenant_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Tenant", &submission.tenant_id))?;
        let notifications = state.db.notifications();
        let settings = notifications.load_settings(&submission.company_id).await?;
        notify_submission_reviewed(
            &notifications,
            &settings,
            &tenant,
            &submission.id,
            fee_name,
            approved,
            reason,
        )
        .await?;
        Ok::<(), ApiError>(())
    }
    .await;

    if let Err(err) = result {
        warn!(
            submission_id = %submission.id,
            error = %err,
            "Submission reviewed but verdict notification could not be queued"
        );
    }
}
