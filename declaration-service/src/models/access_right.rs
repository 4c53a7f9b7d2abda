//! Access right model - collaboration grants scoped to a declaration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Capability granted by an access right.
///
/// Only `admin` is issued today; the enum stays open for future values
/// such as `reader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Admin,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for AccessRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AccessRole::Admin),
            _ => Err(format!("Invalid access role: {}", s)),
        }
    }
}

/// Access right status codes.
///
/// `rejected` is part of the taxonomy but no transition currently
/// produces it; revocation deletes the record instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Approved => "approved",
            AccessStatus::Rejected => "rejected",
        }
    }
}

/// Access right entity.
///
/// While pending, exactly one of `user_id` / `tmp_user_email` is set and
/// the invite token hash and expiry are present. Once approved, the
/// record is bound to a user and the invite fields are all null.
#[derive(Debug, Clone, FromRow)]
pub struct AccessRight {
    pub access_right_id: Uuid,
    pub declaration_id: Uuid,
    pub role_code: String,
    pub status_code: String,
    pub user_id: Option<Uuid>,
    pub tmp_user_email: Option<String>,
    pub invite_token_hash: Option<String>,
    pub invite_expires_at: Option<DateTime<Utc>>,
    pub invited_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl AccessRight {
    /// Create a pending access right bound to an existing identity.
    pub fn new_for_user(
        declaration_id: Uuid,
        user_id: Uuid,
        role: AccessRole,
        token_hash: String,
        expires_at: DateTime<Utc>,
        invited_by_user_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_right_id: Uuid::new_v4(),
            declaration_id,
            role_code: role.as_str().to_string(),
            status_code: AccessStatus::Pending.as_str().to_string(),
            user_id: Some(user_id),
            tmp_user_email: None,
            invite_token_hash: Some(token_hash),
            invite_expires_at: Some(expires_at),
            invited_by_user_id,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Create a pending access right for an email with no identity yet.
    pub fn new_for_email(
        declaration_id: Uuid,
        email: String,
        role: AccessRole,
        token_hash: String,
        expires_at: DateTime<Utc>,
        invited_by_user_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_right_id: Uuid::new_v4(),
            declaration_id,
            role_code: role.as_str().to_string(),
            status_code: AccessStatus::Pending.as_str().to_string(),
            user_id: None,
            tmp_user_email: Some(email),
            invite_token_hash: Some(token_hash),
            invite_expires_at: Some(expires_at),
            invited_by_user_id,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status_code == AccessStatus::Pending.as_str()
    }

    pub fn is_approved(&self) -> bool {
        self.status_code == AccessStatus::Approved.as_str()
    }

    /// Check whether the invite lapsed before `now`.
    pub fn invite_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.invite_expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    /// Promote a pending invite to an approved membership bound to `user_id`.
    ///
    /// Consumes the invite fields; the token hash can never match again.
    pub fn approve_as(&mut self, user_id: Uuid) {
        self.status_code = AccessStatus::Approved.as_str().to_string();
        self.user_id = Some(user_id);
        self.tmp_user_email = None;
        self.invite_token_hash = None;
        self.invite_expires_at = None;
        self.updated_utc = Utc::now();
    }
}
