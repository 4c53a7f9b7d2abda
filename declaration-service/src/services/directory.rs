//! External lookup seams: the user directory and the declaration store.
//!
//! Both are owned by other parts of the platform; this service only reads
//! from them.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Declaration, Identity};

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AppError>;

    /// Email match is case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;
}

#[async_trait]
pub trait DeclarationDirectory: Send + Sync {
    async fn find_by_id(&self, declaration_id: Uuid) -> Result<Option<Declaration>, AppError>;
}

/// In-memory directory used by the integration tests.
#[derive(Default)]
pub struct MemoryDirectory {
    identities: std::sync::Mutex<Vec<Identity>>,
    declarations: std::sync::Mutex<Vec<Declaration>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_identity(&self, identity: Identity) {
        self.identities
            .lock()
            .expect("identity mutex poisoned")
            .push(identity);
    }

    pub fn add_declaration(&self, declaration: Declaration) {
        self.declarations
            .lock()
            .expect("declaration mutex poisoned")
            .push(declaration);
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AppError> {
        let identities = self
            .identities
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(identities.iter().find(|i| i.user_id == user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let identities = self
            .identities
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(identities
            .iter()
            .find(|i| i.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl DeclarationDirectory for MemoryDirectory {
    async fn find_by_id(&self, declaration_id: Uuid) -> Result<Option<Declaration>, AppError> {
        let declarations = self
            .declarations
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(declarations
            .iter()
            .find(|d| d.declaration_id == declaration_id)
            .cloned())
    }
}
