//! Request identity extractors.
//!
//! The pipeline never performs credential checks itself: an upstream auth
//! proxy authenticates portal users and installs identity headers, and the
//! external cron authenticates to the job endpoints with a shared secret.
//!
//! ```text
//! X-Scheduler-Token   shared secret for /internal/jobs/* (constant-time)
//! X-Company-Id        acting management company (staff operations)
//! X-Staff-Id          acting staff user within the company
//! X-Tenant-Id         acting tenant (tenant portal operations)
//! ```

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::AppState;

/// Constant-time byte comparison, so a token probe can't learn prefix
/// lengths from response timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// Scheduler
// =============================================================================

/// Proof that the request carried the scheduler shared secret.
pub struct SchedulerAuth;

impl FromRequestParts<Arc<AppState>> for SchedulerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = header(parts, "x-scheduler-token")
            .ok_or_else(|| ApiError::Unauthorized("missing X-Scheduler-Token".to_string()))?;

        if !constant_time_eq(
            token.as_bytes(),
            state.config.scheduler_secret.as_bytes(),
        ) {
            return Err(ApiError::Unauthorized("invalid scheduler token".to_string()));
        }

        Ok(SchedulerAuth)
    }
}

// =============================================================================
// Portal Identities
// =============================================================================

/// The acting management company and staff user.
pub struct CompanyIdentity {
    pub company_id: String,
    pub staff_id: String,
}

impl FromRequestParts<Arc<AppState>> for CompanyIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let company_id = header(parts, "x-company-id")
            .ok_or_else(|| ApiError::Unauthorized("missing X-Company-Id".to_string()))?
            .to_string();
        let staff_id = header(parts, "x-staff-id")
            .ok_or_else(|| ApiError::Unauthorized("missing X-Staff-Id".to_string()))?
            .to_string();

        Ok(CompanyIdentity {
            company_id,
            staff_id,
        })
    }
}

/// The acting tenant (tenant portal).
pub struct TenantIdentity {
    pub tenant_id: String,
}

impl FromRequestParts<Arc<AppState>> for TenantIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let tenant_id = header(parts, "x-tenant-id")
            .ok_or_else(|| ApiError::Unauthorized("missing X-Tenant-Id".to_string()))?
            .to_string();

        Ok(TenantIdentity { tenant_id })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(!constant_time_eq(b"", b"s3cret"));
        assert!(constant_time_eq(b"", b""));
    }
}
