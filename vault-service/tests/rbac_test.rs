mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::TestApp;
use vault_service::models::Role;

async fn browse(app: &TestApp, path: &str, cookie: Option<&str>) -> common::TestResponse {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::ACCEPT, "text/html,application/xhtml+xml");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.send(builder.body(Body::empty()).unwrap()).await
}

fn location(res: &common::TestResponse) -> &str {
    res.headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn anonymous_api_callers_get_401() {
    let app = TestApp::spawn().await;

    for path in ["/documents", "/gov/documents/pending", "/gov/admin/audit", "/me"] {
        let res = app.get(path, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(res.body["code"], "authentication_error");
    }
}

#[tokio::test]
async fn anonymous_browsers_are_sent_to_login() {
    let app = TestApp::spawn().await;

    let res = browse(&app, "/documents", None).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");
}

#[tokio::test]
async fn citizens_are_kept_out_of_gov_routes() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;

    let res = app.get("/gov/documents/pending", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = browse(&app, "/gov/documents/pending", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard");
}

#[tokio::test]
async fn government_is_kept_out_of_citizen_routes() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.government(Role::GovAssociate, None).await;

    let res = app.get("/documents", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = browse(&app, "/documents", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/gov/dashboard");
}

#[tokio::test]
async fn admin_routes_need_gov_admin() {
    let app = TestApp::spawn().await;
    let (_, official) = app.government(Role::GovOfficial, None).await;
    let (_, admin) = app.government(Role::GovAdmin, None).await;

    let res = app.get("/gov/admin/organizations", Some(&official)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/gov/admin/organizations", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);

    // gov_admin inherits the wider /gov prefix.
    let res = app.get("/gov/documents/pending", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_paths_are_denied() {
    let app = TestApp::spawn().await;
    let (_, cookie) = app.citizen().await;

    let res = app.get("/internal/secrets", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/internal/secrets", Some(&cookie)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_routes_need_no_session() {
    let app = TestApp::spawn().await;

    let res = app.get("/health", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["checks"]["store"], "up");

    let res = app.get("/.well-known/openapi.json", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["paths"]["/auth/login"].is_object());
}

#[tokio::test]
async fn authenticated_swagger_mode_restricts_the_api_document() {
    let app = TestApp::spawn_with(&[("ENABLE_SWAGGER", "authenticated")]).await;

    let res = app.get("/.well-known/openapi.json", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let (_, citizen) = app.citizen().await;
    let res = app.get("/.well-known/openapi.json", Some(&citizen)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let (_, admin) = app.government(Role::GovAdmin, None).await;
    let res = app.get("/.well-known/openapi.json", Some(&admin)).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let app = TestApp::spawn().await;
    let res = app.get("/health", None).await;

    assert_eq!(res.headers["x-content-type-options"], "nosniff");
    assert!(res.headers.contains_key("x-request-id"));
}
