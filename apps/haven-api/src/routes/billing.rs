//! Billing and payment handlers.
//!
//! Payment mutations follow the optimistic-concurrency pattern: the handler
//! computes the transition from a snapshot of the billing, and the repository
//! commits it only if `paid_minor` is still what the snapshot saw. On a lost
//! race the handler reloads and recomputes, up to a small bound.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::warn;

use haven_core::billing::{apply_payment, remove_payment};
use haven_core::{Billing, BillingDetails, Money, Payment, PaymentMethod};
use haven_db::DbError;
use haven_jobs::notify_payment_confirmed;

use crate::auth::CompanyIdentity;
use crate::error::ApiError;
use crate::AppState;

/// Lost-race reload bound for the payment CAS loop.
const MAX_CAS_RETRIES: u32 = 3;

#[derive(Debug, Deserialize)]
pub struct ListBillingsQuery {
    /// Filter to one billing month ("YYYY-MM").
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount_minor: i64,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
}

/// Loads a billing scoped to the acting company. Another company's billing
/// is indistinguishable from a missing one.
async fn load_scoped_billing(
    state: &AppState,
    identity: &CompanyIdentity,
    id: &str,
) -> Result<Billing, ApiError> {
    let billing = state
        .db
        .billings()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Billing", id))?;
    if billing.company_id != identity.company_id {
        return Err(ApiError::not_found("Billing", id));
    }
    Ok(billing)
}

/// GET /api/billings
pub async fn list_billings(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Query(query): Query<ListBillingsQuery>,
) -> Result<Json<Vec<Billing>>, ApiError> {
    let billings = state
        .db
        .billings()
        .list_for_company(&identity.company_id, query.month.as_deref())
        .await?;
    Ok(Json(billings))
}

/// GET /api/billings/{id}
pub async fn get_billing(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(id): Path<String>,
) -> Result<Json<BillingDetails>, ApiError> {
    let details = state
        .db
        .billings()
        .get_details(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Billing", &id))?;
    if details.billing.company_id != identity.company_id {
        return Err(ApiError::not_found("Billing", &id));
    }
    Ok(Json(details))
}

/// POST /api/billings/{id}/payments
pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(id): Path<String>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let billings = state.db.billings();
    let today = Utc::now().date_naive();

    let mut attempts = 0;
    let payment = loop {
        let billing = load_scoped_billing(&state, &identity, &id).await?;
        let outcome = apply_payment(
            &billing.id,
            billing.status,
            billing.paid(),
            billing.total(),
            Money::from_minor(req.amount_minor),
            billing.due_date,
            today,
        )?;

        match billings
            .record_payment(
                &billing.id,
                billing.paid_minor,
                outcome,
                req.amount_minor,
                req.paid_on,
                req.method,
            )
            .await
        {
            Ok(payment) => break payment,
            Err(DbError::Conflict(msg)) => {
                attempts += 1;
                if attempts >= MAX_CAS_RETRIES {
                    return Err(ApiError::Conflict(msg));
                }
            }
            Err(other) => return Err(other.into()),
        }
    };

    // The payment is committed; a notification hiccup must not undo it.
    if let Err(err) = queue_payment_confirmation(&state, &id, &payment).await {
        warn!(
            billing_id = %id,
            payment_id = %payment.id,
            error = %err,
            "Payment recorded but confirmation could not be queued"
        );
    }

    Ok((StatusCode::CREATED, Json(payment)))
}

async fn queue_payment_confirmation(
    state: &AppState,
    billing_id: &str,
    payment: &Payment,
) -> Result<(), ApiError> {
    let billing = state
        .db
        .billings()
        .get_by_id(billing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Billing", billing_id))?;
    let tenant = state
        .db
        .companies()
        .get_tenant(&billing.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant", &billing.tenant_id))?;

    let notifications = state.db.notifications();
    let settings = notifications.load_settings(&billing.company_id).await?;
    notify_payment_confirmed(&notifications, &settings, &tenant, &billing, payment).await?;
    Ok(())
}

/// DELETE /api/billings/{id}/payments/{payment_id}
pub async fn delete_payment(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path((id, payment_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let billings = state.db.billings();
    let today = Utc::now().date_naive();

    let payment = billings
        .get_payment(&payment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment", &payment_id))?;
    if payment.billing_id != id {
        return Err(ApiError::not_found("Payment", &payment_id));
    }

    let mut attempts = 0;
    loop {
        let billing = load_scoped_billing(&state, &identity, &id).await?;
        let outcome = remove_payment(
            &billing.id,
            billing.status,
            billing.paid(),
            billing.total(),
            payment.amount(),
            billing.due_date,
            today,
        )?;

        match billings
            .delete_payment(&id, &payment_id, billing.paid_minor, outcome)
            .await
        {
            Ok(()) => return Ok(StatusCode::NO_CONTENT),
            Err(DbError::Conflict(msg)) => {
                attempts += 1;
                if attempts >= MAX_CAS_RETRIES {
                    return Err(ApiError::Conflict(msg));
                }
            }
            Err(other) => return Err(other.into()),
        }
    }
}

/// POST /api/billings/{id}/cancel
pub async fn cancel_billing(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(id): Path<String>,
) -> Result<Json<Billing>, ApiError> {
    // Scope check first, so the repository conflict path only sees billings
    // the caller may touch.
    load_scoped_billing(&state, &identity, &id).await?;
    let cancelled = state.db.billings().cancel(&id).await?;
    Ok(Json(cancelled))
}
