//! Collaboration access control for declarations.
//!
//! Implements the invite/claim/revoke flow:
//! - Issue a pending access right with a hashed single-use invite token
//! - Claim the token to bind and approve the membership
//! - List and revoke memberships, gated by current membership

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::Actor;
use crate::models::{AccessRight, AccessRole, Identity};
use crate::services::{
    AccessRightStore, DeclarationDirectory, EmailProvider, IdentityDirectory,
};
use service_core::error::AppError;

const INVITE_EXPIRY_DAYS: i64 = 7;

/// An access right joined with its resolved member identity for display.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub right: AccessRight,
    pub user: Option<Identity>,
}

#[derive(Clone)]
pub struct AccessService {
    store: Arc<dyn AccessRightStore>,
    identities: Arc<dyn IdentityDirectory>,
    declarations: Arc<dyn DeclarationDirectory>,
    email: Arc<dyn EmailProvider>,
    base_url: String,
}

impl AccessService {
    pub fn new(
        store: Arc<dyn AccessRightStore>,
        identities: Arc<dyn IdentityDirectory>,
        declarations: Arc<dyn DeclarationDirectory>,
        email: Arc<dyn EmailProvider>,
        base_url: String,
    ) -> Self {
        Self {
            store,
            identities,
            declarations,
            email,
            base_url,
        }
    }

    /// Issue a pending invite for `email` on a declaration.
    ///
    /// The returned record carries only the token digest; the raw secret
    /// leaves the process exclusively inside the invite email.
    pub async fn issue_invite(
        &self,
        actor: &Actor,
        declaration_id: Uuid,
        email: &str,
        role: AccessRole,
    ) -> Result<AccessRight, AppError> {
        let declaration = self
            .declarations
            .find_by_id(declaration_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Declaration not found")))?;

        if self
            .find_right_for_email(declaration_id, email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "An access right already exists for this email on this declaration"
            )));
        }

        // Zero matches means the person has not registered yet; the invite
        // is parked on the email until claim time.
        let invitee = self.identities.find_by_email(email).await?;

        let token = generate_invite_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::days(INVITE_EXPIRY_DAYS);

        let right = match &invitee {
            Some(identity) => AccessRight::new_for_user(
                declaration_id,
                identity.user_id,
                role,
                token_hash,
                expires_at,
                actor.user_id,
            ),
            None => AccessRight::new_for_email(
                declaration_id,
                email.to_string(),
                role,
                token_hash,
                expires_at,
                actor.user_id,
            ),
        };

        self.store.insert(&right).await?;

        // The record must survive a failed dispatch so the invite can be
        // resent later.
        if let Err(e) = self
            .email
            .send_invite_email(
                email,
                &token,
                &declaration.declaration_name,
                &declaration.entity_name,
                &self.base_url,
            )
            .await
        {
            tracing::error!(
                error = %e,
                access_right_id = %right.access_right_id,
                "Failed to send invite email"
            );
        }

        tracing::info!(
            access_right_id = %right.access_right_id,
            declaration_id = %declaration_id,
            "Invite issued"
        );

        Ok(right)
    }

    /// Redeem an invite token on behalf of the authenticated actor.
    pub async fn claim_invite(&self, actor: &Actor, token: &str) -> Result<AccessRight, AppError> {
        let token_hash = hash_token(token);

        let right = self
            .store
            .find_pending_by_token_hash(&token_hash)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Invitation not found or already used"))
            })?;

        let declaration = self
            .declarations
            .find_by_id(right.declaration_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Declaration {} missing for pending invitation",
                    right.declaration_id
                ))
            })?;

        // A leaked link must not be redeemable by another account.
        let identity_matches = match right.user_id {
            Some(invited_user_id) => invited_user_id == actor.user_id,
            None => right
                .tmp_user_email
                .as_deref()
                .is_some_and(|invited| invited.eq_ignore_ascii_case(&actor.email)),
        };
        if !identity_matches {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "This invitation was issued to a different account"
            )));
        }

        if right.invite_expired_at(Utc::now()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invitation has expired"
            )));
        }

        // Conditional update; a concurrent claim that lost the race sees
        // the invite as already used.
        let approved = self
            .store
            .approve_pending(right.access_right_id, actor.user_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Invitation not found or already used"))
            })?;

        match self.identities.find_by_id(right.invited_by_user_id).await? {
            Some(inviter) => {
                if let Err(e) = self
                    .email
                    .send_invite_accepted_email(
                        &inviter.email,
                        actor.label(),
                        &declaration.declaration_name,
                    )
                    .await
                {
                    tracing::error!(
                        error = %e,
                        access_right_id = %approved.access_right_id,
                        "Failed to notify inviter"
                    );
                }
            }
            None => {
                tracing::warn!(
                    invited_by_user_id = %right.invited_by_user_id,
                    "Inviter identity no longer exists, skipping notification"
                );
            }
        }

        tracing::info!(
            access_right_id = %approved.access_right_id,
            declaration_id = %approved.declaration_id,
            "Invite claimed"
        );

        Ok(approved)
    }

    /// Rotate the secret of a still-pending invite and dispatch the email
    /// again. Membership-gated like revocation.
    pub async fn resend_invite(&self, actor: &Actor, id: Uuid) -> Result<AccessRight, AppError> {
        let right = self
            .store
            .find_by_id(id)
            .await?
            .filter(|r| r.is_pending())
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("No pending invitation to resend"))
            })?;

        self.require_membership(right.declaration_id, actor).await?;

        let declaration = self
            .declarations
            .find_by_id(right.declaration_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Declaration {} missing for pending invitation",
                    right.declaration_id
                ))
            })?;

        let recipient = match (&right.tmp_user_email, right.user_id) {
            (Some(email), _) => email.clone(),
            (None, Some(user_id)) => self
                .identities
                .find_by_id(user_id)
                .await?
                .map(|i| i.email)
                .ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!(
                        "Invited user {} missing from directory",
                        user_id
                    ))
                })?,
            (None, None) => {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "Pending access right {} has neither user nor email",
                    id
                )))
            }
        };

        let token = generate_invite_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::days(INVITE_EXPIRY_DAYS);

        let rotated = self
            .store
            .rotate_invite_token(id, &token_hash, expires_at)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("No pending invitation to resend"))
            })?;

        self.email
            .send_invite_email(
                &recipient,
                &token,
                &declaration.declaration_name,
                &declaration.entity_name,
                &self.base_url,
            )
            .await?;

        tracing::info!(
            access_right_id = %rotated.access_right_id,
            "Invite resent"
        );

        Ok(rotated)
    }

    /// List a declaration's access rights with resolved member identities.
    pub async fn list_access_rights(
        &self,
        actor: &Actor,
        declaration_id: Uuid,
    ) -> Result<Vec<MemberRecord>, AppError> {
        self.require_membership(declaration_id, actor).await?;

        let rights = self.store.list_for_declaration(declaration_id).await?;

        let mut members = Vec::with_capacity(rights.len());
        for right in rights {
            let user = match right.user_id {
                Some(user_id) => self.identities.find_by_id(user_id).await?,
                None => None,
            };
            members.push(MemberRecord { right, user });
        }

        Ok(members)
    }

    /// Delete an access right. Any member of the declaration may revoke
    /// any other member; role is not consulted.
    pub async fn revoke_access_right(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<AccessRight, AppError> {
        let target = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Access right not found")))?;

        self.require_membership(target.declaration_id, actor).await?;

        self.store.delete(id).await?;

        tracing::info!(
            access_right_id = %id,
            declaration_id = %target.declaration_id,
            "Access right revoked"
        );

        Ok(target)
    }

    async fn require_membership(
        &self,
        declaration_id: Uuid,
        actor: &Actor,
    ) -> Result<AccessRight, AppError> {
        self.store
            .find_for_member(declaration_id, actor.user_id)
            .await?
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!(
                    "Not a member of this declaration"
                ))
            })
    }

    /// Duplicate pre-check: an invite already targets this email when the
    /// address matches either a bound member's directory email or an
    /// unclaimed tmp email. Read-then-write only; no store-level guard.
    async fn find_right_for_email(
        &self,
        declaration_id: Uuid,
        email: &str,
    ) -> Result<Option<AccessRight>, AppError> {
        for right in self.store.list_for_declaration(declaration_id).await? {
            if right
                .tmp_user_email
                .as_deref()
                .is_some_and(|tmp| tmp.eq_ignore_ascii_case(email))
            {
                return Ok(Some(right));
            }

            if let Some(user_id) = right.user_id {
                if self
                    .identities
                    .find_by_id(user_id)
                    .await?
                    .is_some_and(|i| i.email.eq_ignore_ascii_case(email))
                {
                    return Ok(Some(right));
                }
            }
        }
        Ok(None)
    }
}

/// Generate the raw invite secret: 256 bits from the thread CSPRNG.
fn generate_invite_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

/// Digest stored in place of the raw secret.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
