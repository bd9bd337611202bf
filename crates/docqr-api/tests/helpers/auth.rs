use super::api_path;
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

/// Registered account with its bearer token.
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Register an account through the API. `role` is `"admin"` or `"user"`.
pub async fn register_test_user(client: &TestServer, username: &str, role: &str) -> TestUser {
    let password = "Password123!".to_string();
    let response = client
        .post(&api_path("/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": password,
            "role": role,
        }))
        .await;
    assert_eq!(response.status_code(), 201, "register failed: {}", response.text());

    let body: Value = response.json();
    TestUser {
        id: body["user"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("user id in register response"),
        username: username.to_string(),
        password,
        token: body["token"].as_str().expect("token").to_string(),
    }
}

pub async fn register_admin(client: &TestServer) -> TestUser {
    register_test_user(client, "admin", "admin").await
}

pub async fn register_user(client: &TestServer) -> TestUser {
    register_test_user(client, "alice", "user").await
}
