// Shared helpers for the HTTP integration tests
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use recipe_api::{
    actions::users::create_user,
    api,
    jwt::TokenService,
    memory::MemoryStore,
    queue::queue::MemoryQueue,
    schema::{User, UserRole},
    state::AppContext,
    store::{Store, StoreTx},
};
use serde_json::Value;
use warp::http::StatusCode;

pub const PASSWORD: &str = "testpass123";

/// The full filter tree wired to in-memory backends.
pub struct TestApp {
    pub ctx: AppContext,
    pub store: MemoryStore,
    pub queue: MemoryQueue,
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let queue = MemoryQueue::new();
        let tokens = TokenService::new("test-secret", Duration::minutes(60), Duration::hours(24))
            .expect("Failed to create token service");
        let ctx = AppContext::new(Arc::new(store.clone()), tokens, Arc::new(queue.clone()));

        Self { ctx, store, queue }
    }

    /// Creates a user directly and returns it with a valid access token
    pub async fn user(&self, email: &str) -> (User, String) {
        let user = create_user(email, PASSWORD, "Test Name", UserRole::User, &self.store)
            .await
            .expect("Failed to create user");
        let token = self
            .ctx
            .tokens
            .issue_access(&user)
            .expect("Failed to issue token");

        (user, token)
    }

    pub async fn call(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&api::routes(self.ctx.clone())).await;
        let status = response.status();
        let body = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body()).expect("Response body is not JSON")
        };

        (status, body)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PATCH", path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("PUT", path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.call("DELETE", path, Some(token), None).await
    }

    /// Opens a transaction for inspecting stored rows
    pub async fn tx(&self) -> Box<dyn StoreTx> {
        self.store.begin().await.expect("Failed to open transaction")
    }
}

/// A minimal valid recipe payload
pub fn sample_recipe(title: &str) -> Value {
    serde_json::json!({
        "title": title,
        "time_minutes": 22,
        "price": "5.25",
    })
}
