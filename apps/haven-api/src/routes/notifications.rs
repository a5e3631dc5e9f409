//! Notification queue handlers.
//!
//! Staff can broadcast an ad-hoc announcement to a tenant and inspect the
//! queue. Announcements carry no dedupe key: repeating one is a deliberate
//! re-send, unlike the event-driven producers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use haven_core::{NotificationPayload, NotificationQueueItem, QueueStatus};
use haven_jobs::{fan_out_to_tenant, FanOutReport};

use crate::auth::CompanyIdentity;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub tenant_id: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub status: Option<QueueStatus>,
}

/// POST /api/notifications
pub async fn create_announcement(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<FanOutReport>), ApiError> {
    if req.title.trim().is_empty() || req.body.trim().is_empty() {
        return Err(ApiError::Validation(
            "announcement title and body are required".to_string(),
        ));
    }

    let tenant = state
        .db
        .companies()
        .get_tenant(&req.tenant_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tenant", &req.tenant_id))?;
    if tenant.company_id != identity.company_id {
        return Err(ApiError::not_found("Tenant", &req.tenant_id));
    }

    let notifications = state.db.notifications();
    let settings = notifications.load_settings(&identity.company_id).await?;
    let payload = NotificationPayload::Announcement {
        title: req.title,
        body: req.body,
    };
    let report =
        fan_out_to_tenant(&notifications, &settings, &tenant, &payload, None, Utc::now()).await?;

    Ok((StatusCode::ACCEPTED, Json(report)))
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<NotificationQueueItem>>, ApiError> {
    let items = state
        .db
        .notifications()
        .list_for_company(&identity.company_id, query.status)
        .await?;
    Ok(Json(items))
}

/// GET /api/notifications/{id}
pub async fn get_notification(
    State(state): State<Arc<AppState>>,
    identity: CompanyIdentity,
    Path(id): Path<String>,
) -> Result<Json<NotificationQueueItem>, ApiError> {
    let item = state
        .db
        .notifications()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification", &id))?;
    if item.company_id != identity.company_id {
        return Err(ApiError::not_found("Notification", &id));
    }
    Ok(Json(item))
}
