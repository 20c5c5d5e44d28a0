mod common;

use axum::http::StatusCode;
use common::{kamara_registration, TestApp};
use serde_json::json;
use uuid::Uuid;
use vault_service::models::{AuditAction, Role};
use vault_service::services::{organizations::NewOrganization, AuditFilter};

async fn entries(app: &TestApp, action: AuditAction) -> Vec<serde_json::Value> {
    app.state
        .audit
        .query(&AuditFilter {
            action: Some(action),
            limit: 50,
            ..AuditFilter::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|e| serde_json::to_value(e).unwrap())
        .collect()
}

async fn decide(app: &TestApp, cookie: &str, id: &str, decision: &str, reason: Option<&str>) -> common::TestResponse {
    let mut body = json!({ "documentId": id, "decision": decision });
    if let Some(reason) = reason {
        body["reason"] = json!(reason);
    }
    app.post_json("/gov/verify", body, Some(cookie)).await
}

#[tokio::test]
async fn upload_lands_pending_with_a_score() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;

    let res = app.upload(&cookie, "Birth Certificate").await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "PENDING_VERIFICATION");
    assert_eq!(res.body["type"], "Birth Certificate");
    let score = res.body["metadata"]["authenticityScore"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));

    let res = app.get("/documents", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    assert_eq!(entries(&app, AuditAction::DocumentUpload).await.len(), 1);
}

#[tokio::test]
async fn approval_verifies_exactly_once() {
    let app = TestApp::spawn().await;
    let (_, citizen) = app.citizen().await;
    let (officer_id, officer) = app.government(Role::GovOfficial, None).await;
    let doc = app.upload(&citizen, "Birth Certificate").await;
    let id = doc.body["id"].as_str().unwrap();

    let res = decide(&app, &officer, id, "APPROVE", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "VERIFIED");
    assert_eq!(res.body["govAudit"]["verifiedBy"], officer_id.to_string());

    let res = decide(&app, &officer, id, "APPROVE", None).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let verified = entries(&app, AuditAction::DocumentVerified).await;
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0]["actorId"], officer_id.to_string());
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let app = TestApp::spawn().await;
    let (_, citizen) = app.citizen().await;
    let (_, officer) = app.government(Role::GovOfficial, None).await;
    let doc = app.upload(&citizen, "Birth Certificate").await;
    let id = doc.body["id"].as_str().unwrap();

    let res = decide(&app, &officer, id, "REJECT", None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let pending = app.get("/gov/documents/pending", Some(&officer)).await;
    let ids: Vec<&str> = pending
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["id"].as_str())
        .collect();
    assert!(ids.contains(&id));
}

#[tokio::test]
async fn rejection_deletes_and_keeps_the_audit_trail() {
    let app = TestApp::spawn().await;
    let (_, citizen) = app.citizen().await;
    let (_, officer) = app.government(Role::GovOfficial, None).await;
    let doc = app.upload(&citizen, "Birth Certificate").await;
    let id = doc.body["id"].as_str().unwrap();

    let res = decide(&app, &officer, id, "REJECT", Some("Seal is illegible")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "deleted": true, "documentId": id }));

    let res = app.get("/documents", Some(&citizen)).await;
    assert!(res.body.as_array().unwrap().is_empty());

    let rejected = entries(&app, AuditAction::DocumentDeletedRejected).await;
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["targetId"], id);
    assert_eq!(rejected[0]["details"]["reason"], "Seal is illegible");
    assert_eq!(rejected[0]["details"]["originalTitle"], "My Birth Certificate");
    assert_eq!(rejected[0]["details"]["originalType"], "Birth Certificate");

    // The document is gone, so a second decision finds nothing.
    let res = decide(&app, &officer, id, "APPROVE", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, officer) = app.government(Role::GovOfficial, None).await;

    let res = decide(&app, &officer, &Uuid::new_v4().to_string(), "APPROVE", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_decisions_have_one_winner() {
    let app = TestApp::spawn().await;
    let (_, citizen) = app.citizen().await;
    let (_, first) = app.government(Role::GovOfficial, None).await;
    let (_, second) = app.government(Role::GovAssociate, None).await;
    let doc = app.upload(&citizen, "Birth Certificate").await;
    let id = doc.body["id"].as_str().unwrap();

    let (a, b) = tokio::join!(
        decide(&app, &first, id, "APPROVE", None),
        decide(&app, &second, id, "REJECT", Some("Duplicate submission")),
    );

    let mut statuses = vec![a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let verified = entries(&app, AuditAction::DocumentVerified).await.len();
    let rejected = entries(&app, AuditAction::DocumentDeletedRejected).await.len();
    assert_eq!(verified + rejected, 1);
}

#[tokio::test]
async fn citizens_can_request_documents() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;

    let res = app
        .post_json(
            "/documents/request",
            json!({ "type": "Passport", "title": "First passport", "notes": "Urgent travel" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "REQUESTED");
    assert_eq!(res.body["notes"], "Urgent travel");
    assert!(res.body["contentLocator"].is_null());

    let res = app
        .post_json(
            "/documents/request",
            json!({ "type": "", "title": "Nothing" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn issuance_targets_the_national_id_holder() {
    let app = TestApp::spawn().await;
    let registered = app
        .post_json(
            "/auth/register",
            kamara_registration("kamara@example.com", "+23276000002"),
            None,
        )
        .await;
    assert_eq!(registered.status, StatusCode::CREATED);
    let (officer_id, officer) = app.government(Role::GovOfficial, None).await;

    let res = app
        .post_json(
            "/gov/issue",
            json!({
                "nin": "1234567",
                "type": "Driving Licence",
                "title": "Class B licence",
                "contentLocator": "s3://vault-test/licence.pdf"
            }),
            Some(&officer),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "ISSUED");
    assert_eq!(res.body["ownerId"], registered.body["id"]);
    assert_eq!(res.body["govAudit"]["uploadedBy"], officer_id.to_string());

    let citizen = app.session_for("kamara@example.com").await;
    let res = app.get("/documents", Some(&citizen)).await;
    assert_eq!(res.body[0]["status"], "ISSUED");

    let res = app
        .post_json(
            "/gov/issue",
            json!({
                "nin": "9999999",
                "type": "Driving Licence",
                "title": "Class B licence",
                "contentLocator": "s3://vault-test/licence.pdf"
            }),
            Some(&officer),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn routing_tags_scope_officers() {
    let app = TestApp::spawn().await;
    let (admin_id, _) = app.government(Role::GovAdmin, None).await;
    let org = app
        .state
        .organizations
        .create(
            admin_id,
            NewOrganization {
                name: "Passport Office".to_string(),
                org_type: "agency".to_string(),
                code: "PPO".to_string(),
                tier: 2,
                routing_tags: vec!["Passport".to_string()],
            },
        )
        .await
        .unwrap();

    let (_, citizen) = app.citizen().await;
    let (_, officer) = app.government(Role::GovOfficial, Some(org.id)).await;

    let birth = app.upload(&citizen, "Birth Certificate").await;
    let res = decide(&app, &officer, birth.body["id"].as_str().unwrap(), "APPROVE", None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let passport = app.upload(&citizen, "Passport").await;
    let res = decide(&app, &officer, passport.body["id"].as_str().unwrap(), "APPROVE", None).await;
    assert_eq!(res.status, StatusCode::OK);
}
