//! PostgreSQL database service for declaration-service.
//!
//! Implements the store and directory seams over a shared connection pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{AccessRight, AccessStatus, Declaration, Identity};
use crate::services::{AccessRightStore, DeclarationDirectory, IdentityDirectory};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccessRightStore for Database {
    async fn insert(&self, right: &AccessRight) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO access_rights (
                access_right_id, declaration_id, role_code, status_code,
                user_id, tmp_user_email, invite_token_hash, invite_expires_at,
                invited_by_user_id, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(right.access_right_id)
        .bind(right.declaration_id)
        .bind(&right.role_code)
        .bind(&right.status_code)
        .bind(right.user_id)
        .bind(&right.tmp_user_email)
        .bind(&right.invite_token_hash)
        .bind(right.invite_expires_at)
        .bind(right.invited_by_user_id)
        .bind(right.created_utc)
        .bind(right.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccessRight>, AppError> {
        sqlx::query_as::<_, AccessRight>(
            "SELECT * FROM access_rights WHERE access_right_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_pending_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccessRight>, AppError> {
        sqlx::query_as::<_, AccessRight>(
            "SELECT * FROM access_rights WHERE invite_token_hash = $1 AND status_code = $2",
        )
        .bind(token_hash)
        .bind(AccessStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn list_for_declaration(
        &self,
        declaration_id: Uuid,
    ) -> Result<Vec<AccessRight>, AppError> {
        sqlx::query_as::<_, AccessRight>(
            "SELECT * FROM access_rights WHERE declaration_id = $1 ORDER BY created_utc",
        )
        .bind(declaration_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_for_member(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessRight>, AppError> {
        sqlx::query_as::<_, AccessRight>(
            "SELECT * FROM access_rights WHERE declaration_id = $1 AND user_id = $2",
        )
        .bind(declaration_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn approve_pending(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessRight>, AppError> {
        // Conditional update: the WHERE clause loses the race for us.
        sqlx::query_as::<_, AccessRight>(
            r#"
            UPDATE access_rights
            SET status_code = $3,
                user_id = $2,
                tmp_user_email = NULL,
                invite_token_hash = NULL,
                invite_expires_at = NULL,
                updated_utc = now()
            WHERE access_right_id = $1 AND status_code = $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(AccessStatus::Approved.as_str())
        .bind(AccessStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn rotate_invite_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<AccessRight>, AppError> {
        sqlx::query_as::<_, AccessRight>(
            r#"
            UPDATE access_rights
            SET invite_token_hash = $2,
                invite_expires_at = $3,
                updated_utc = now()
            WHERE access_right_id = $1 AND status_code = $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(AccessStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM access_rights WHERE access_right_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for Database {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Identity>, AppError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        sqlx::query_as::<_, Identity>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }
}

#[async_trait]
impl DeclarationDirectory for Database {
    async fn find_by_id(&self, declaration_id: Uuid) -> Result<Option<Declaration>, AppError> {
        sqlx::query_as::<_, Declaration>(
            "SELECT * FROM declarations WHERE declaration_id = $1",
        )
        .bind(declaration_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }
}
