//! Shared fixtures for API integration tests.
//!
//! Every test app runs on the in-memory store with a pinned clock and the
//! same middleware stack as production.
#![allow(dead_code)]

use std::sync::Arc;

use academy_api::auth::jwt::{generate_access_token, JwtConfig};
use academy_api::config::ServerConfig;
use academy_api::router::build_app_router;
use academy_api::state::AppState;
use academy_core::clock::FixedClock;
use academy_core::roles::{ROLE_ADMIN, ROLE_APPROVER, ROLE_COACH, ROLE_COUNSELLOR};
use academy_core::types::DbId;
use academy_db::models::batch::{Batch, CreateBatch};
use academy_db::MemoryStore;
use academy_events::{DirectoryUser, EventBus, StaticDirectory};
use academy_lifecycle::{Academy, Context};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::{NaiveTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const ADMIN_ID: DbId = 1;
pub const APPROVER_ID: DbId = 2;
pub const COUNSELLOR_ID: DbId = 3;
pub const COACH_ID: DbId = 4;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

fn user(id: DbId, username: &str, role: &str) -> DirectoryUser {
    DirectoryUser {
        id,
        username: username.to_string(),
        role: role.to_string(),
        email: None,
        is_active: true,
    }
}

pub struct TestApp {
    pub router: Router,
    pub academy: Academy,
    pub clock: Arc<FixedClock>,
    config: ServerConfig,
}

/// Build the full application router over a fresh in-memory store.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    ));
    let directory = StaticDirectory::new(vec![
        user(ADMIN_ID, "asha", ROLE_ADMIN),
        user(APPROVER_ID, "priya", ROLE_APPROVER),
        user(COUNSELLOR_ID, "ravi", ROLE_COUNSELLOR),
        user(COACH_ID, "sam", ROLE_COACH),
    ]);
    let ctx = Context::new(Arc::new(MemoryStore::new()), Arc::new(EventBus::default()))
        .with_clock(clock.clone())
        .with_directory(Arc::new(directory));
    let academy = Academy::new(ctx);

    let state = AppState {
        academy: academy.clone(),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        academy,
        clock,
        config,
    }
}

impl TestApp {
    pub fn token(&self, user_id: DbId, role: &str) -> String {
        generate_access_token(user_id, role, &self.config.jwt).unwrap()
    }

    pub fn admin(&self) -> String {
        self.token(ADMIN_ID, ROLE_ADMIN)
    }

    pub fn approver(&self) -> String {
        self.token(APPROVER_ID, ROLE_APPROVER)
    }

    pub fn counsellor(&self) -> String {
        self.token(COUNSELLOR_ID, ROLE_COUNSELLOR)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: &str) -> Response {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post_json(&self, uri: &str, token: &str, body: serde_json::Value) -> Response {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// A batch in center 1 meeting Mon/Wed/Fri evenings.
    pub async fn batch(&self, name: &str, max_capacity: i32) -> Batch {
        self.academy
            .roster
            .create_batch(CreateBatch {
                center_id: 1,
                name: name.to_string(),
                days_of_week: vec![1, 3, 5],
                start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                max_capacity,
                coach_id: Some(COACH_ID),
            })
            .await
            .unwrap()
    }

    /// Create a lead through the API and return the `data` object.
    pub async fn create_lead(&self, name: &str) -> serde_json::Value {
        let response = self
            .post_json(
                "/api/v1/leads",
                &self.counsellor(),
                serde_json::json!({
                    "full_name": name,
                    "phone": "+91 98450 00000",
                    "center_id": 1,
                    "assigned_user_id": COUNSELLOR_ID,
                }),
            )
            .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        body_json(response).await["data"].clone()
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
