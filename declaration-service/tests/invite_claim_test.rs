//! Invitation claim flow.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{actor_for, extract_invite_token, hash_token, read_json, TestApp};
use serde_json::json;
use service_core::error::AppError;

/// Issue an invite and return the raw token captured from the email.
async fn issue_and_capture_token(
    app: &TestApp,
    inviter: &declaration_service::models::Identity,
    declaration_id: uuid::Uuid,
    email: &str,
) -> String {
    let response = app
        .request(
            "POST",
            &format!("/declarations/{}/access-rights", declaration_id),
            Some(&actor_for(inviter)),
            Some(json!({"email": email, "role": "admin"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let sent = app.email.sent();
    extract_invite_token(&sent.last().expect("no invite email").html_body)
}

#[tokio::test]
async fn unregistered_invitee_registers_then_claims() {
    // Scenario A: the invite predates the account.
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", Some("Owner"));
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "new@x.fr").await;

    let newcomer = app.seed_identity("new@x.fr", Some("Newcomer"));

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&newcomer)),
            Some(json!({"token": token})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["user_id"], newcomer.user_id.to_string());
    assert!(body["tmp_user_email"].is_null());
    assert!(body["invite_expires_at"].is_null());
}

#[tokio::test]
async fn registered_invitee_claims_with_bound_account() {
    // Scenario B: the invite was bound at issue time.
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", Some("Owner"));
    let bob = app.seed_identity("bob@x.fr", Some("Bob"));
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["user_id"], bob.user_id.to_string());
}

#[tokio::test]
async fn claim_consumes_the_invite_fields() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let bob = app.seed_identity("bob@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app
        .state
        .store
        .list_for_declaration(declaration.declaration_id)
        .await
        .unwrap();
    assert!(stored[0].is_approved());
    assert!(stored[0].tmp_user_email.is_none());
    assert!(stored[0].invite_token_hash.is_none());
    assert!(stored[0].invite_expires_at.is_none());
}

#[tokio::test]
async fn leaked_link_cannot_be_claimed_by_another_account() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let _bob = app.seed_identity("bob@x.fr", None);
    let mallory = app.seed_identity("mallory@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&mallory)),
            Some(json!({"token": token})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unregistered_invite_requires_the_invited_email() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "new@x.fr").await;

    // Registered under a different address than the invite targets.
    let other = app.seed_identity("other@x.fr", None);

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&other)),
            Some(json!({"token": token})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_token_yields_not_found() {
    let app = TestApp::spawn().await;
    let claimant = app.seed_identity("bob@x.fr", None);

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&claimant)),
            Some(json!({"token": "0".repeat(64)})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_claim_of_a_consumed_token_yields_not_found() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let bob = app.seed_identity("bob@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    let first = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_invite_is_rejected_as_bad_request() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let bob = app.seed_identity("bob@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    // Backdate the expiry while keeping the same digest.
    let stored = app
        .state
        .store
        .list_for_declaration(declaration.declaration_id)
        .await
        .unwrap();
    app.state
        .store
        .rotate_invite_token(
            stored[0].access_right_id,
            &hash_token(&token),
            Utc::now() - Duration::days(1),
        )
        .await
        .unwrap()
        .expect("invite should still be pending");

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Still pending: expiry is enforced lazily, nothing is swept.
    let stored = app
        .state
        .store
        .list_for_declaration(declaration.declaration_id)
        .await
        .unwrap();
    assert!(stored[0].is_pending());
}

#[tokio::test]
async fn concurrent_claims_produce_exactly_one_member() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let bob = app.seed_identity("bob@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    let actor = actor_for(&bob);
    let access = app.state.access.clone();
    let (first, second) = tokio::join!(
        access.claim_invite(&actor, &token),
        access.claim_invite(&actor, &token),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(loser, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn claim_notifies_the_inviter() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", Some("Owner"));
    let bob = app.seed_identity("bob@x.fr", Some("Bob"));
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.email.sent();
    let notification = sent.last().expect("no notification email");
    assert_eq!(notification.to, "owner@x.fr");
    assert!(notification.subject.contains("accepted"));
    assert!(notification.subject.contains("Bob"));
}

#[tokio::test]
async fn notification_failure_does_not_fail_the_claim() {
    let app = TestApp::spawn().await;
    let inviter = app.seed_identity("owner@x.fr", None);
    let bob = app.seed_identity("bob@x.fr", None);
    let declaration = app.seed_declaration("example.org audit", "Example Org");
    let token =
        issue_and_capture_token(&app, &inviter, declaration.declaration_id, "bob@x.fr").await;

    app.email.set_failing(true);

    let response = app
        .request(
            "POST",
            "/access-rights/claim",
            Some(&actor_for(&bob)),
            Some(json!({"token": token})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "approved");
}
