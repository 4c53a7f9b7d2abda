//! Identity model - the user directory row shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A resolved identity from the user directory.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Identity {
    pub fn new(email: String, display_name: Option<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            display_name,
            created_utc: Utc::now(),
        }
    }
}
