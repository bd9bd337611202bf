//! Authentication and admin API integration tests.
//!
//! Run with: `cargo test -p docqr-api --test auth_admin_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::auth::{register_admin, register_test_user, register_user};
use helpers::fixtures::{minimal_pdf, upload_form};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
#[ignore = "requires docker"]
async fn test_register_login_and_me() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = register_user(client).await;

    let duplicate = client
        .post(&api_path("/auth/register"))
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "Password123!"
        }))
        .await;
    assert_eq!(duplicate.status_code(), 400);

    let wrong = client
        .post(&api_path("/auth/login"))
        .json(&json!({ "username": "alice", "password": "nope-nope" }))
        .await;
    assert_eq!(wrong.status_code(), 401);
    let body: Value = wrong.json();
    assert_eq!(body["error"], "Invalid credentials");

    // Email works as the login name as well.
    let login = client
        .post(&api_path("/auth/login"))
        .json(&json!({ "username": "alice@example.com", "password": user.password }))
        .await;
    assert_eq!(login.status_code(), 200);
    let body: Value = login.json();
    let token = body["token"].as_str().expect("token");
    assert!(body["user"].get("password_hash").is_none());

    let me = client
        .get(&api_path("/auth/me"))
        .add_header("Authorization", format!("Bearer {}", token))
        .await;
    assert_eq!(me.status_code(), 200);
    let body: Value = me.json();
    assert_eq!(body["user"]["username"], user.username);
    assert_eq!(body["user"]["role"], "user");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_public_registration_honours_requested_role() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;

    let me = client
        .get(&api_path("/auth/me"))
        .add_header("Authorization", admin.bearer())
        .await;
    let body: Value = me.json();
    assert_eq!(body["user"]["role"], "admin");

    let stats = client
        .get(&api_path("/admin/statistics"))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(stats.status_code(), 200);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_deactivated_account_is_locked_out() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;
    let user = register_user(client).await;

    let deactivated = client
        .delete(&api_path(&format!("/admin/users/{}", user.id)))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(deactivated.status_code(), 200);

    let me = client
        .get(&api_path("/auth/me"))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(me.status_code(), 401);
    let body: Value = me.json();
    assert_eq!(body["error"], "Account is deactivated");

    let login = client
        .post(&api_path("/auth/login"))
        .json(&json!({ "username": user.username, "password": user.password }))
        .await;
    assert_eq!(login.status_code(), 401);

    let reactivated = client
        .put(&api_path(&format!("/admin/users/{}", user.id)))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "isActive": true }))
        .await;
    assert_eq!(reactivated.status_code(), 200);

    let me = client
        .get(&api_path("/auth/me"))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(me.status_code(), 200);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_admin_user_management() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;
    register_test_user(client, "bob", "user").await;

    let created = client
        .post(&api_path("/admin/users"))
        .add_header("Authorization", admin.bearer())
        .json(&json!({
            "username": "carol",
            "email": "Carol@Example.com",
            "password": "secret123",
            "role": "admin"
        }))
        .await;
    assert_eq!(created.status_code(), 201);
    let body: Value = created.json();
    assert_eq!(body["user"]["email"], "carol@example.com");
    assert_eq!(body["user"]["role"], "admin");
    let carol_id = body["user"]["id"].as_str().expect("id").to_string();

    let taken = client
        .put(&api_path(&format!("/admin/users/{}", carol_id)))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "username": "bob" }))
        .await;
    assert_eq!(taken.status_code(), 400);
    let body: Value = taken.json();
    assert_eq!(body["error"], "Username already exists");

    let listed = client
        .get(&api_path("/admin/users"))
        .add_query_param("limit", 2)
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(listed.status_code(), 200);
    let body: Value = listed.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["users"].as_array().map(Vec::len), Some(2));

    let bad_role = client
        .post(&api_path("/admin/users"))
        .add_header("Authorization", admin.bearer())
        .json(&json!({
            "username": "dave",
            "email": "dave@example.com",
            "password": "secret123",
            "role": "superuser"
        }))
        .await;
    assert_eq!(bad_role.status_code(), 400);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_admin_routes_reject_regular_users() {
    let app = setup_test_app().await;
    let client = app.client();
    let user = register_user(client).await;

    for path in ["/admin/users", "/admin/audit-logs", "/admin/statistics"] {
        let response = client
            .get(&api_path(path))
            .add_header("Authorization", user.bearer())
            .await;
        assert_eq!(response.status_code(), 403, "{} should be admin only", path);
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_statistics_and_audit_log_filters() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;
    let user = register_user(client).await;

    let upload = client
        .post(&api_path("/documents"))
        .add_header("Authorization", user.bearer())
        .multipart(upload_form("Q1 Report", "q1.pdf", "application/pdf", minimal_pdf()))
        .await;
    assert_eq!(upload.status_code(), 201);

    let stats = client
        .get(&api_path("/admin/statistics"))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(stats.status_code(), 200);
    let body: Value = stats.json();
    assert_eq!(body["statistics"]["totalUsers"], 2);
    assert_eq!(body["statistics"]["totalDocuments"], 1);
    assert_eq!(
        body["statistics"]["totalStorageBytes"],
        minimal_pdf().len() as i64
    );

    let mut logs = Value::Null;
    for _ in 0..50 {
        let response = client
            .get(&api_path("/admin/audit-logs"))
            .add_query_param("action", "create")
            .add_query_param("userId", user.id.to_string())
            .add_header("Authorization", admin.bearer())
            .await;
        assert_eq!(response.status_code(), 200);
        logs = response.json();
        if logs["total"] == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["logs"][0]["resource_type"], "DOCUMENT");
    assert_eq!(logs["logs"][0]["username"], "alice");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_health_and_openapi_are_public() {
    let app = setup_test_app().await;
    let client = app.client();

    let health = client.get("/health").await;
    assert_eq!(health.status_code(), 200);
    let body: Value = health.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["storage"], "local");

    let root = client.get(&api_path("")).await;
    assert_eq!(root.status_code(), 200);

    let spec = client.get("/api-docs/openapi.json").await;
    assert_eq!(spec.status_code(), 200);
    let body: Value = spec.json();
    assert!(body["paths"].get("/api/documents").is_some());
}
