//! Declaration model - the parent resource access rights are scoped to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A declaration and its owning entity's display name.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Declaration {
    pub declaration_id: Uuid,
    pub declaration_name: String,
    pub entity_name: String,
    pub created_utc: DateTime<Utc>,
}

impl Declaration {
    pub fn new(declaration_name: String, entity_name: String) -> Self {
        Self {
            declaration_id: Uuid::new_v4(),
            declaration_name,
            entity_name,
            created_utc: Utc::now(),
        }
    }
}
