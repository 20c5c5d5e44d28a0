#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::util::ServiceExt;
use uuid::Uuid;
use vault_core::config::Config as CoreConfig;
use vault_service::{
    build_router,
    config::VaultConfig,
    models::{RegistryRecord, Role},
    services::{
        identity::NewGovernmentPrincipal, HeuristicScorer, JwtService, MemoryStore,
        MockEmailService,
    },
    utils::Password,
    AppState,
};

pub const PRIVATE_KEY: &str = include_str!("../fixtures/test_private_key.pem");
pub const PUBLIC_KEY: &str = include_str!("../fixtures/test_public_key.pem");
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of the session cookie set by this response.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("vault_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    pub email: MockEmailService,
    _keys: (NamedTempFile, NamedTempFile),
}

fn key_file(pem: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(pem.as_bytes()).unwrap();
    file
}

pub fn test_config(overrides: &[(&str, &str)]) -> (VaultConfig, (NamedTempFile, NamedTempFile)) {
    let private_key = key_file(PRIVATE_KEY);
    let public_key = key_file(PUBLIC_KEY);

    let mut vars: HashMap<String, String> = [
        ("STORE_BACKEND", "memory"),
        ("LOG_LEVEL", "error"),
        ("PUBLIC_BASE_URL", "https://vault.test"),
        ("RATE_LIMIT_LOGIN_ATTEMPTS", "1000"),
        ("RATE_LIMIT_REGISTER_ATTEMPTS", "1000"),
        ("RATE_LIMIT_PASSWORD_RESET_ATTEMPTS", "1000"),
        ("RATE_LIMIT_STEP_UP_ATTEMPTS", "1000"),
        ("RATE_LIMIT_GLOBAL_IP_LIMIT", "10000"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert(
        "JWT_PRIVATE_KEY_PATH".to_string(),
        private_key.path().to_string_lossy().to_string(),
    );
    vars.insert(
        "JWT_PUBLIC_KEY_PATH".to_string(),
        public_key.path().to_string_lossy().to_string(),
    );
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }

    let config = VaultConfig::from_lookup(CoreConfig::default(), move |key| vars.get(key).cloned())
        .unwrap();
    (config, (private_key, public_key))
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    pub async fn spawn_with(overrides: &[(&str, &str)]) -> Self {
        let (config, keys) = test_config(overrides);
        let jwt = JwtService::new(&config.jwt).unwrap();

        let store = MemoryStore::new();
        store
            .insert_registry_record(RegistryRecord {
                nin: "1234567".to_string(),
                surname: "Kamara".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                date_of_expiry: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                personal_id_number: "A1".to_string(),
            })
            .unwrap();
        let email = MockEmailService::new();

        let state = AppState::new(
            config,
            Arc::new(store.clone()),
            jwt,
            Arc::new(email.clone()),
            Arc::new(HeuristicScorer),
        );
        let router = build_router(state.clone()).await.unwrap();

        Self {
            router,
            state,
            store,
            email,
            _keys: keys,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, path: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_bearer(&self, path: &str, token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn login(&self, identifier: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/login",
            json!({ "identifier": identifier, "password": password }),
            None,
        )
        .await
    }

    /// Log in and return the session cookie.
    pub async fn session_for(&self, identifier: &str) -> String {
        let res = self.login(identifier, PASSWORD).await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.session_cookie().unwrap()
    }

    /// Register a citizen without a national ID and return its session.
    pub async fn citizen(&self) -> (String, String) {
        let email = format!("{}@example.com", Uuid::new_v4().simple());
        let res = self
            .post_json(
                "/auth/register",
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "telephone": unique_telephone(),
                }),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
        let cookie = self.session_for(&email).await;
        (email, cookie)
    }

    /// Provision a government principal directly and return its session.
    pub async fn government(&self, role: Role, organization_id: Option<Uuid>) -> (Uuid, String) {
        let email = format!("{}@gov.test", Uuid::new_v4().simple());
        let principal = self
            .state
            .identity
            .create_government_principal(
                None,
                NewGovernmentPrincipal {
                    email: email.clone(),
                    password: Password::new(PASSWORD.to_string()),
                    telephone: unique_telephone(),
                    role,
                    organization_id,
                },
            )
            .await
            .unwrap();
        let cookie = self.session_for(&email).await;
        (principal.id, cookie)
    }

    pub async fn step_up(&self, cookie: &str, password: &str) -> TestResponse {
        self.post_json("/auth/step-up", json!({ "password": password }), Some(cookie))
            .await
    }

    pub async fn upload(&self, cookie: &str, doc_type: &str) -> TestResponse {
        self.post_json(
            "/documents/upload",
            json!({
                "type": doc_type,
                "title": format!("My {}", doc_type),
                "contentLocator": format!("s3://vault-test/{}.pdf", Uuid::new_v4()),
                "sizeBytes": 2048,
                "mimeType": "application/pdf",
                "contentHash": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
            }),
            Some(cookie),
        )
        .await
    }
}

/// A random E.164 number.
pub fn unique_telephone() -> String {
    format!("+1{:010}", Uuid::new_v4().as_u128() % 10_000_000_000)
}

pub fn kamara_registration(email: &str, telephone: &str) -> Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "telephone": telephone,
        "nin": "1234567",
        "surname": "Kamara",
        "dob": "1990-01-01",
        "dateOfExpiry": "2030-01-01",
        "personalIdNumber": "A1"
    })
}
