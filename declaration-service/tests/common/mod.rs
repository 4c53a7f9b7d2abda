//! Test helper module for declaration-service integration tests.
//!
//! Runs the full router against the in-memory store, directory, and email
//! doubles, so no external services are needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use declaration_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, InviteConfig, SecurityConfig, ServiceConfig, SmtpConfig,
    },
    middleware::Actor,
    models::{AccessRight, AccessRole, Declaration, Identity},
    services::{
        AccessRightStore, AccessService, DeclarationDirectory, EmailProvider, IdentityDirectory,
        MemoryAccessStore, MemoryDirectory, MockEmailService,
    },
    AppState,
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Test application backed by in-memory doubles.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryAccessStore>,
    pub directory: Arc<MemoryDirectory>,
    pub email: Arc<MockEmailService>,
}

impl TestApp {
    /// Spawn the test application with fresh in-memory state.
    pub async fn spawn() -> Self {
        // Initialize tracing if not already initialized
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .try_init();

        let config = create_test_config();

        let store = Arc::new(MemoryAccessStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let email = Arc::new(MockEmailService::new());

        let store_dyn: Arc<dyn AccessRightStore> = store.clone();
        let identities: Arc<dyn IdentityDirectory> = directory.clone();
        let declarations: Arc<dyn DeclarationDirectory> = directory.clone();
        let email_dyn: Arc<dyn EmailProvider> = email.clone();

        let access = AccessService::new(
            store_dyn.clone(),
            identities,
            declarations,
            email_dyn,
            config.invite.base_url.clone(),
        );

        let state = AppState {
            config,
            store: store_dyn,
            access,
        };

        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        TestApp {
            router,
            state,
            store,
            directory,
            email,
        }
    }

    /// Register an identity in the user directory.
    pub fn seed_identity(&self, email: &str, display_name: Option<&str>) -> Identity {
        let identity = Identity::new(email.to_string(), display_name.map(|s| s.to_string()));
        self.directory.add_identity(identity.clone());
        identity
    }

    /// Register a declaration in the declaration store.
    pub fn seed_declaration(&self, declaration_name: &str, entity_name: &str) -> Declaration {
        let declaration =
            Declaration::new(declaration_name.to_string(), entity_name.to_string());
        self.directory.add_declaration(declaration.clone());
        declaration
    }

    /// Insert an already-approved membership for an identity.
    pub async fn seed_member(&self, declaration_id: Uuid, identity: &Identity) -> AccessRight {
        let mut right = AccessRight::new_for_user(
            declaration_id,
            identity.user_id,
            AccessRole::Admin,
            "seed-digest".to_string(),
            Utc::now() + Duration::days(7),
            identity.user_id,
        );
        right.approve_as(identity.user_id);
        self.store.insert(&right).await.expect("seed member");
        right
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        actor: Option<&Actor>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");

        if let Some(actor) = actor {
            builder = builder
                .header("x-user-id", actor.user_id.to_string())
                .header("x-user-email", actor.email.clone());
            if let Some(name) = &actor.display_name {
                builder = builder.header("x-user-name", name.clone());
            }
        }

        let request = builder
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .expect("Failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }
}

/// The actor matching a directory identity.
pub fn actor_for(identity: &Identity) -> Actor {
    Actor {
        user_id: identity.user_id,
        email: identity.email.clone(),
        display_name: identity.display_name.clone(),
    }
}

pub fn create_test_config() -> ServiceConfig {
    ServiceConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "declaration-service-test".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/declaration_test".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            relay_host: "smtp.example.org".to_string(),
            port: 587,
            user: "declarations@example.org".to_string(),
            password: "test-password".to_string(),
            from_address: "declarations@example.org".to_string(),
        },
        invite: InviteConfig {
            base_url: "http://localhost:3000".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

/// Deserialize a response body as JSON.
pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not valid JSON")
}

/// Pull the raw invite token out of a captured invite email.
pub fn extract_invite_token(html_body: &str) -> String {
    html_body
        .split("token=")
        .nth(1)
        .expect("no claim link in email")
        .split('&')
        .next()
        .expect("malformed claim link")
        .to_string()
}

/// Same digest the service stores: lowercase hex SHA-256.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
