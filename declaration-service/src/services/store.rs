//! Access right store seam.
//!
//! The only shared mutable state in the subsystem. The claim promotion is
//! a conditional update: it succeeds only while the record is still
//! pending, so concurrent claims of one token resolve to a single winner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::AccessRight;

#[async_trait]
pub trait AccessRightStore: Send + Sync {
    async fn insert(&self, right: &AccessRight) -> Result<(), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccessRight>, AppError>;

    /// Look up a still-pending access right by invite token digest.
    async fn find_pending_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccessRight>, AppError>;

    async fn list_for_declaration(
        &self,
        declaration_id: Uuid,
    ) -> Result<Vec<AccessRight>, AppError>;

    /// The actor's own access right on a declaration, if any is bound to
    /// their identity.
    async fn find_for_member(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessRight>, AppError>;

    /// Promote a pending access right to approved, bound to `user_id`.
    ///
    /// Conditional update: returns `None` when the record is missing or no
    /// longer pending, so a lost claim race is observable by the caller.
    async fn approve_pending(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessRight>, AppError>;

    /// Replace the invite secret digest and expiry of a pending invite.
    ///
    /// Returns `None` when the record is missing or no longer pending.
    async fn rotate_invite_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<AccessRight>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

/// In-memory store used by the integration tests.
#[derive(Default)]
pub struct MemoryAccessStore {
    rights: std::sync::Mutex<std::collections::HashMap<Uuid, AccessRight>>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<Uuid, AccessRight>>, AppError>
    {
        self.rights
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl AccessRightStore for MemoryAccessStore {
    async fn insert(&self, right: &AccessRight) -> Result<(), AppError> {
        self.lock()?.insert(right.access_right_id, right.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccessRight>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_pending_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccessRight>, AppError> {
        Ok(self
            .lock()?
            .values()
            .find(|r| r.is_pending() && r.invite_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list_for_declaration(
        &self,
        declaration_id: Uuid,
    ) -> Result<Vec<AccessRight>, AppError> {
        let mut rights: Vec<AccessRight> = self
            .lock()?
            .values()
            .filter(|r| r.declaration_id == declaration_id)
            .cloned()
            .collect();
        rights.sort_by_key(|r| r.created_utc);
        Ok(rights)
    }

    async fn find_for_member(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessRight>, AppError> {
        Ok(self
            .lock()?
            .values()
            .find(|r| r.declaration_id == declaration_id && r.user_id == Some(user_id))
            .cloned())
    }

    async fn approve_pending(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessRight>, AppError> {
        let mut rights = self.lock()?;
        match rights.get_mut(&id) {
            Some(right) if right.is_pending() => {
                right.approve_as(user_id);
                Ok(Some(right.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn rotate_invite_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<AccessRight>, AppError> {
        let mut rights = self.lock()?;
        match rights.get_mut(&id) {
            Some(right) if right.is_pending() => {
                right.invite_token_hash = Some(token_hash.to_string());
                right.invite_expires_at = Some(expires_at);
                right.updated_utc = Utc::now();
                Ok(Some(right.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.lock()?.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
