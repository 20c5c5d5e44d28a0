mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{TestApp, PASSWORD, PRIVATE_KEY, PUBLIC_KEY};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use uuid::Uuid;
use vault_service::models::{AuditAction, Role};
use vault_service::services::jwt::STEP_UP_AUDIENCE;
use vault_service::services::{AuditFilter, JwtService, StepUpClaims};

async fn ledger_size(app: &TestApp) -> usize {
    app.state
        .audit
        .query(&AuditFilter {
            limit: 500,
            ..AuditFilter::default()
        })
        .await
        .unwrap()
        .len()
}

fn session_token(cookie: &str) -> String {
    cookie.trim_start_matches("vault_session=").to_string()
}

#[tokio::test]
async fn wrong_password_yields_401_and_leaves_no_trace() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;
    let before = ledger_size(&app).await;

    let res = app.step_up(&cookie, "not-my-password").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body.get("token").is_none());
    assert_eq!(ledger_size(&app).await, before);
}

#[tokio::test]
async fn step_up_requires_a_session() {
    let app = TestApp::spawn().await;
    let res = app
        .post_json("/auth/step-up", json!({ "password": PASSWORD }), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn step_up_token_carries_document_access_scope() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;

    let res = app.step_up(&cookie, PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["expiresIn"], 300);

    let claims = app
        .state
        .jwt
        .verify_step_up(res.body["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.scope, "document_access");
    assert_eq!(claims.role, Role::Citizen);
}

#[tokio::test]
async fn view_rejects_session_credentials() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;
    let doc = app.upload(&cookie, "Birth Certificate").await;
    let path = format!("/documents/{}/view", doc.body["id"].as_str().unwrap());

    let res = app.get(&path, Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // A session token presented as a bearer has the wrong audience.
    let res = app.get_with_bearer(&path, &session_token(&cookie)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn view_with_step_up_grants_access_and_is_audited() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;
    let doc = app.upload(&cookie, "Birth Certificate").await;
    let id = doc.body["id"].as_str().unwrap().to_string();

    let token = app.step_up(&cookie, PASSWORD).await.body["token"]
        .as_str()
        .unwrap()
        .to_string();
    let res = app
        .get_with_bearer(&format!("/documents/{}/view", id), &token)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["documentId"], id);
    assert_eq!(res.body["contentLocator"], doc.body["contentLocator"]);
    assert_eq!(res.body["mimeType"], "application/pdf");

    let granted = app
        .state
        .audit
        .query(&AuditFilter {
            action: Some(AuditAction::AccessGranted),
            limit: 10,
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].target_id.map(|t| t.to_string()), Some(id));
    assert_eq!(granted[0].details["method"], "step-up");
}

#[tokio::test]
async fn citizens_cannot_see_into_other_vaults() {
    let app = TestApp::spawn().await;
    let (_, owner) = app.citizen().await;
    let (_, intruder) = app.citizen().await;
    let doc = app.upload(&owner, "Birth Certificate").await;

    let token = app.step_up(&intruder, PASSWORD).await.body["token"]
        .as_str()
        .unwrap()
        .to_string();

    let foreign = app
        .get_with_bearer(
            &format!("/documents/{}/view", doc.body["id"].as_str().unwrap()),
            &token,
        )
        .await;
    let missing = app
        .get_with_bearer(&format!("/documents/{}/view", Uuid::new_v4()), &token)
        .await;

    assert_eq!(foreign.status, StatusCode::FORBIDDEN);
    assert_eq!(missing.status, StatusCode::FORBIDDEN);
    assert_eq!(foreign.body["error"], missing.body["error"]);
}

#[tokio::test]
async fn government_may_view_any_document() {
    let app = TestApp::spawn().await;
    let (_, citizen) = app.citizen().await;
    let doc = app.upload(&citizen, "Birth Certificate").await;
    let (_, officer) = app.government(Role::GovOfficial, None).await;

    let token = app.step_up(&officer, PASSWORD).await.body["token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .get_with_bearer(
            &format!("/documents/{}/view", doc.body["id"].as_str().unwrap()),
            &token,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .get_with_bearer(&format!("/documents/{}/view", Uuid::new_v4()), &token)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requested_documents_have_nothing_to_view() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;
    let doc = app
        .post_json(
            "/documents/request",
            json!({ "type": "Passport", "title": "Passport renewal" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(doc.status, StatusCode::CREATED);

    let token = app.step_up(&cookie, PASSWORD).await.body["token"]
        .as_str()
        .unwrap()
        .to_string();
    let res = app
        .get_with_bearer(
            &format!("/documents/{}/view", doc.body["id"].as_str().unwrap()),
            &token,
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_step_up_token_is_rejected() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;
    let doc = app.upload(&cookie, "Birth Certificate").await;
    let me = app.get("/me", Some(&cookie)).await;
    let principal_id: Uuid = me.body["id"].as_str().unwrap().parse().unwrap();

    // Same keys and issuer, but tokens that lapsed a minute ago.
    let stale = JwtService::from_pem(
        PRIVATE_KEY.as_bytes(),
        PUBLIC_KEY.as_bytes(),
        &app.state.config.jwt.issuer,
    )
    .unwrap()
    .with_ttls(Duration::days(7), Duration::minutes(-1));
    let expired = stale.issue_step_up(principal_id, Role::Citizen).unwrap();

    let res = app
        .get_with_bearer(
            &format!("/documents/{}/view", doc.body["id"].as_str().unwrap()),
            &expired.token,
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn step_up_token_for_another_scope_is_rejected() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;
    let doc = app.upload(&cookie, "Birth Certificate").await;
    let me = app.get("/me", Some(&cookie)).await;
    let principal_id: Uuid = me.body["id"].as_str().unwrap().parse().unwrap();

    // Correctly signed, right audience and issuer, unexpired; only the scope differs.
    let now = Utc::now();
    let claims = StepUpClaims {
        sub: principal_id,
        role: Role::Citizen,
        scope: "profile_access".to_string(),
        aud: STEP_UP_AUDIENCE.to_string(),
        iss: app.state.config.jwt.issuer.clone(),
        exp: (now + Duration::minutes(5)).timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4(),
    };
    let token = encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap(),
    )
    .unwrap();

    let res = app
        .get_with_bearer(
            &format!("/documents/{}/view", doc.body["id"].as_str().unwrap()),
            &token,
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let granted = app
        .state
        .audit
        .query(&AuditFilter {
            action: Some(AuditAction::AccessGranted),
            limit: 10,
            ..AuditFilter::default()
        })
        .await
        .unwrap();
    assert!(granted.is_empty());
}
