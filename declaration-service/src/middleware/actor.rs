use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Authenticated actor extractor for declaration-service
///
/// Extracts the acting identity from headers set by the trusted session
/// gateway. Session establishment itself lives outside this service; by
/// the time a request arrives here the gateway has already authenticated
/// it and stamped the identity headers.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

impl Actor {
    /// Name shown in notification emails, falling back to the address.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing x-user-id header (required from gateway)"
                ))
            })?;

        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid x-user-id header")))?;

        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing x-user-email header (required from gateway)"
                ))
            })?
            .to_string();

        let display_name = parts
            .headers
            .get("x-user-name")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Add to tracing span for observability
        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        Ok(Actor {
            user_id,
            email,
            display_name,
        })
    }
}
