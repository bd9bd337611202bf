//! Category API integration tests.
//!
//! Run with: `cargo test -p docqr-api --test categories_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::auth::{register_admin, register_user};
use helpers::fixtures::{minimal_pdf, upload_form};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};

async fn create_category(client: &axum_test::TestServer, bearer: &str, name: &str) -> Value {
    let response = client
        .post(&api_path("/categories"))
        .add_header("Authorization", bearer)
        .json(&json!({ "name": name, "description": "Contracts and agreements" }))
        .await;
    assert_eq!(response.status_code(), 201, "create failed: {}", response.text());
    let body: Value = response.json();
    body["category"].clone()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_category_crud() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;

    let category = create_category(client, &admin.bearer(), "Legal").await;
    let id = category["id"].as_str().expect("category id");

    let listed = client
        .get(&api_path("/categories"))
        .add_header("Authorization", admin.bearer())
        .await;
    let body: Value = listed.json();
    assert_eq!(body["categories"][0]["name"], "Legal");
    assert_eq!(body["categories"][0]["document_count"], 0);
    assert_eq!(body["categories"][0]["created_by_username"], "admin");

    let renamed = client
        .put(&api_path(&format!("/categories/{}", id)))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "name": "Legal & Compliance" }))
        .await;
    assert_eq!(renamed.status_code(), 200);
    let body: Value = renamed.json();
    assert_eq!(body["category"]["name"], "Legal & Compliance");
    assert_eq!(body["category"]["description"], "Contracts and agreements");

    let deleted = client
        .delete(&api_path(&format!("/categories/{}", id)))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(deleted.status_code(), 200);

    let fetched = client
        .get(&api_path(&format!("/categories/{}", id)))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(fetched.status_code(), 404);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_duplicate_name_conflicts() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;

    create_category(client, &admin.bearer(), "Financial").await;
    let other = create_category(client, &admin.bearer(), "HR").await;

    let duplicate = client
        .post(&api_path("/categories"))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "name": "Financial" }))
        .await;
    assert_eq!(duplicate.status_code(), 400);
    let body: Value = duplicate.json();
    assert_eq!(body["code"], "CONFLICT");

    let rename_clash = client
        .put(&api_path(&format!("/categories/{}", other["id"].as_str().expect("id"))))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "name": "Financial" }))
        .await;
    assert_eq!(rename_clash.status_code(), 400);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_concurrent_same_name_creates_one_category() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;

    let create = || {
        client
            .post(&api_path("/categories"))
            .add_header("Authorization", admin.bearer())
            .json(&json!({ "name": "Invoices" }))
    };
    let (first, second) = tokio::join!(create(), create());

    let mut statuses = vec![first.status_code().as_u16(), second.status_code().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![201, 400]);

    let rejected = if first.status_code() == 400 { first } else { second };
    let body: Value = rejected.json();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["error"], "Category already exists");

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM document_categories WHERE name = 'Invoices'")
            .fetch_one(app.pool())
            .await
            .expect("count categories");
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_category_in_use_cannot_be_deleted() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;
    let category = create_category(client, &admin.bearer(), "Technical").await;
    let category_id = category["id"].as_str().expect("category id").to_string();

    let upload = client
        .post(&api_path("/documents"))
        .add_header("Authorization", admin.bearer())
        .multipart(
            upload_form("Manual", "manual.pdf", "application/pdf", minimal_pdf())
                .add_text("categoryId", category_id.clone()),
        )
        .await;
    assert_eq!(upload.status_code(), 201);
    let document: Value = upload.json();
    assert_eq!(document["document"]["category_name"], "Technical");

    let blocked = client
        .delete(&api_path(&format!("/categories/{}", category_id)))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(blocked.status_code(), 400);
    let body: Value = blocked.json();
    assert_eq!(body["code"], "HAS_DEPENDENTS");

    // Soft-deleted documents no longer hold the category.
    let document_id = document["document"]["id"].as_str().expect("document id");
    client
        .delete(&api_path(&format!("/documents/{}", document_id)))
        .add_header("Authorization", admin.bearer())
        .await;

    let allowed = client
        .delete(&api_path(&format!("/categories/{}", category_id)))
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(allowed.status_code(), 200);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_users_can_read_but_not_manage_categories() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = register_admin(client).await;
    let user = register_user(client).await;
    let category = create_category(client, &admin.bearer(), "Marketing").await;

    let listed = client
        .get(&api_path("/categories"))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(listed.status_code(), 200);

    let create = client
        .post(&api_path("/categories"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "name": "Sales" }))
        .await;
    assert_eq!(create.status_code(), 403);

    let delete = client
        .delete(&api_path(&format!("/categories/{}", category["id"].as_str().expect("id"))))
        .add_header("Authorization", user.bearer())
        .await;
    assert_eq!(delete.status_code(), 403);
}
