//! Access right handlers for declaration-service.
//!
//! Implements the collaboration flow:
//! - Issue an invite on a declaration (email with single-use token)
//! - Claim an invite token
//! - List and revoke memberships

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::Actor;
use crate::models::{AccessRight, AccessRole};
use crate::services::MemberRecord;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to invite an email onto a declaration.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccessRightRequest {
    #[validate(email)]
    pub email: String,
    pub role: AccessRole,
}

/// Request to claim an invite token.
#[derive(Debug, Deserialize, Validate)]
pub struct ClaimInviteRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

/// Access right for API responses.
///
/// Never carries the raw invite token nor its digest.
#[derive(Debug, Serialize)]
pub struct AccessRightResponse {
    pub access_right_id: Uuid,
    pub declaration_id: Uuid,
    pub role: String,
    pub status: String,
    pub user_id: Option<Uuid>,
    pub tmp_user_email: Option<String>,
    pub invite_expires_at: Option<DateTime<Utc>>,
    pub invited_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<AccessRight> for AccessRightResponse {
    fn from(r: AccessRight) -> Self {
        Self {
            access_right_id: r.access_right_id,
            declaration_id: r.declaration_id,
            role: r.role_code,
            status: r.status_code,
            user_id: r.user_id,
            tmp_user_email: r.tmp_user_email,
            invite_expires_at: r.invite_expires_at,
            invited_by_user_id: r.invited_by_user_id,
            created_utc: r.created_utc,
            updated_utc: r.updated_utc,
        }
    }
}

/// Resolved member identity for listing.
#[derive(Debug, Serialize)]
pub struct MemberIdentityResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// Access right joined with its member identity for display.
#[derive(Debug, Serialize)]
pub struct AccessRightDetailsResponse {
    #[serde(flatten)]
    pub access_right: AccessRightResponse,
    pub user: Option<MemberIdentityResponse>,
}

impl From<MemberRecord> for AccessRightDetailsResponse {
    fn from(m: MemberRecord) -> Self {
        Self {
            access_right: m.right.into(),
            user: m.user.map(|u| MemberIdentityResponse {
                user_id: u.user_id,
                email: u.email,
                display_name: u.display_name,
            }),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Invite an email to co-manage a declaration.
///
/// POST /declarations/{declaration_id}/access-rights
#[tracing::instrument(skip_all, fields(declaration_id = %declaration_id))]
pub async fn create_access_right(
    State(state): State<AppState>,
    actor: Actor,
    Path(declaration_id): Path<Uuid>,
    Json(req): Json<CreateAccessRightRequest>,
) -> Result<(StatusCode, Json<AccessRightResponse>), AppError> {
    req.validate()?;

    let right = state
        .access
        .issue_invite(&actor, declaration_id, &req.email, req.role)
        .await?;

    Ok((StatusCode::CREATED, Json(right.into())))
}

/// Claim an invite token for the authenticated actor.
///
/// POST /access-rights/claim
#[tracing::instrument(skip_all)]
pub async fn claim_access_right(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ClaimInviteRequest>,
) -> Result<Json<AccessRightResponse>, AppError> {
    req.validate()?;

    let right = state.access.claim_invite(&actor, &req.token).await?;

    Ok(Json(right.into()))
}

/// Rotate and re-send a pending invite.
///
/// POST /access-rights/{access_right_id}/resend
#[tracing::instrument(skip_all, fields(access_right_id = %access_right_id))]
pub async fn resend_access_right_invite(
    State(state): State<AppState>,
    actor: Actor,
    Path(access_right_id): Path<Uuid>,
) -> Result<Json<AccessRightResponse>, AppError> {
    let right = state.access.resend_invite(&actor, access_right_id).await?;

    Ok(Json(right.into()))
}

/// List the access rights on a declaration.
///
/// GET /declarations/{declaration_id}/access-rights
#[tracing::instrument(skip_all, fields(declaration_id = %declaration_id))]
pub async fn list_access_rights(
    State(state): State<AppState>,
    actor: Actor,
    Path(declaration_id): Path<Uuid>,
) -> Result<Json<Vec<AccessRightDetailsResponse>>, AppError> {
    let members = state
        .access
        .list_access_rights(&actor, declaration_id)
        .await?;

    Ok(Json(members.into_iter().map(Into::into).collect()))
}

/// Revoke an access right.
///
/// DELETE /access-rights/{access_right_id}
#[tracing::instrument(skip_all, fields(access_right_id = %access_right_id))]
pub async fn revoke_access_right(
    State(state): State<AppState>,
    actor: Actor,
    Path(access_right_id): Path<Uuid>,
) -> Result<Json<AccessRightResponse>, AppError> {
    let right = state
        .access
        .revoke_access_right(&actor, access_right_id)
        .await?;

    Ok(Json(right.into()))
}
