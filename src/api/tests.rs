//! HTTP tests against the full router and an in-memory database

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};

use super::{build_router, AppState};
use crate::db::{create_test_pool, migrations};

const PASSWORD: &str = "Secret#123";

async fn setup_server() -> TestServer {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    TestServer::new(build_router(AppState::new(pool, 24), "*")).expect("Failed to start test server")
}

fn authed(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

async fn register(server: &TestServer, username: &str) -> Value {
    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": PASSWORD,
            "confirmPassword": PASSWORD,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()["object"].clone()
}

async fn login(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": username, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()["object"]["token"]
        .as_str()
        .expect("token in login response")
        .to_string()
}

/// Registers `username` and, when `role` is given, has the admin assign it
async fn user_with_role(
    server: &TestServer,
    admin_token: &str,
    username: &str,
    role: Option<&str>,
) -> (i64, String) {
    let id = register(server, username).await["id"].as_i64().unwrap();
    if let Some(role) = role {
        let response = authed(server.put(&format!("/api/v1/users/{id}")), admin_token)
            .json(&json!({ "role": role }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }
    (id, login(server, username).await)
}

/// Admin session plus categories Text (1), Photo (2), Video (3) and
/// theme Travel listing Text and Photo
async fn seed_catalogue(server: &TestServer) -> (String, i64) {
    register(server, "admin").await;
    let admin = login(server, "admin").await;

    for (name, types) in [("Text", "text"), ("Photo", "image"), ("Video", "video")] {
        let response = authed(server.post("/api/v1/categories"), &admin)
            .json(&json!({ "name": name, "allowTypes": [types] }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let response = authed(server.post("/api/v1/themes"), &admin)
        .json(&json!({ "name": "Travel", "categories": [1, 2] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let theme_id = response.json::<Value>()["object"]["id"].as_i64().unwrap();

    (admin, theme_id)
}

fn content_body(title: &str, theme: i64, blocks: Value) -> Value {
    json!({
        "title": title,
        "description": "A weekend away",
        "image": "https://example.com/cover.png",
        "theme": theme,
        "data": blocks,
    })
}

#[tokio::test]
async fn test_health() {
    let server = setup_server().await;

    let response = server.get("/api/v1/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["message"], "OK");
}

#[tokio::test]
async fn test_first_user_is_admin_and_hash_is_hidden() {
    let server = setup_server().await;

    let first = register(&server, "ana").await;
    let second = register(&server, "bob").await;

    assert_eq!(first["role"], "ADMIN");
    assert_eq!(second["role"], "READER");
    assert!(first.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_register_validation_errors() {
    let server = setup_server().await;

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({ "username": "ana" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "MISSING_FIELD");
    assert!(body["message"].as_str().unwrap().contains("confirmPassword"));

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": "ana",
            "email": "ana@example.com",
            "password": PASSWORD,
            "confirmPassword": "Other#123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["message"], "Passwords do not match");
}

#[tokio::test]
async fn test_malformed_json_is_unprocessable() {
    let server = setup_server().await;

    let response = server
        .post("/api/v1/auth/login")
        .add_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .text("{not json")
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_failure_does_not_reveal_which_part_was_wrong() {
    let server = setup_server().await;
    register(&server, "ana").await;

    let unknown = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "nobody", "password": PASSWORD }))
        .await;
    let wrong = server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "ana", "password": "Wrong#123" }))
        .await;

    assert_eq!(unknown.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(wrong.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(
        unknown.json::<Value>()["message"],
        wrong.json::<Value>()["message"]
    );
}

#[tokio::test]
async fn test_session_token_sources_and_logout() {
    let server = setup_server().await;
    register(&server, "ana").await;
    let token = login(&server, "ana").await;

    let me = authed(server.get("/api/v1/auth/me"), &token).await;
    assert_eq!(me.status_code(), StatusCode::OK);
    assert_eq!(me.json::<Value>()["object"]["username"], "ana");

    let via_header = server
        .get("/api/v1/auth/me")
        .add_header(
            header::HeaderName::from_static("x-access-token"),
            HeaderValue::from_str(&token).unwrap(),
        )
        .await;
    assert_eq!(via_header.status_code(), StatusCode::OK);

    let via_cookie = server
        .get("/api/v1/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={token}")).unwrap(),
        )
        .await;
    assert_eq!(via_cookie.status_code(), StatusCode::OK);

    let logout = authed(server.post("/api/v1/auth/logout"), &token).await;
    assert_eq!(logout.status_code(), StatusCode::OK);

    let after = authed(server.get("/api/v1/auth/me"), &token).await;
    assert_eq!(after.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_table_is_enforced() {
    let server = setup_server().await;
    let (admin, _theme) = seed_catalogue(&server).await;
    let (_reader_id, reader) = user_with_role(&server, &admin, "rita", None).await;

    // No token
    assert_eq!(server.get("/api/v1/themes").await.status_code(), StatusCode::FORBIDDEN);
    // Public
    assert_eq!(server.get("/api/v1/contents").await.status_code(), StatusCode::OK);
    // Any authenticated user
    assert_eq!(
        authed(server.get("/api/v1/themes"), &reader).await.status_code(),
        StatusCode::OK
    );
    assert_eq!(
        authed(server.get("/api/v1/categories/1"), &reader).await.status_code(),
        StatusCode::OK
    );
    // Admin only
    assert_eq!(
        authed(server.get("/api/v1/categories"), &reader).await.status_code(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        authed(server.get("/api/v1/users"), &reader).await.status_code(),
        StatusCode::FORBIDDEN
    );
    let create = authed(server.post("/api/v1/categories"), &reader)
        .json(&json!({ "name": "Audio", "allowTypes": ["audio"] }))
        .await;
    assert_eq!(create.status_code(), StatusCode::FORBIDDEN);
    // Creators and admins
    let content = authed(server.post("/api/v1/contents"), &reader)
        .json(&content_body("Lisbon", 1, json!([{ "category": 1, "data": "intro" }])))
        .await;
    assert_eq!(content.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_theme_with_unknown_category_is_rejected() {
    let server = setup_server().await;
    let (admin, _theme) = seed_catalogue(&server).await;

    let response = authed(server.post("/api/v1/themes"), &admin)
        .json(&json!({ "name": "Food", "categories": [1, 99] }))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["code"], "INVALID_REFERENCE");

    let themes = authed(server.get("/api/v1/themes"), &admin).await;
    assert_eq!(themes.json::<Value>()["object"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_theme_detail_expands_categories() {
    let server = setup_server().await;
    let (admin, theme) = seed_catalogue(&server).await;

    let response = authed(server.get(&format!("/api/v1/themes/{theme}")), &admin).await;

    let categories = response.json::<Value>()["object"]["categories"].clone();
    assert_eq!(categories[0]["name"], "Text");
    assert_eq!(categories[1]["allowTypes"], json!(["image"]));
}

#[tokio::test]
async fn test_category_delete_is_guarded() {
    let server = setup_server().await;
    let (admin, _theme) = seed_catalogue(&server).await;

    let blocked = authed(server.delete("/api/v1/categories/1"), &admin).await;
    assert_eq!(blocked.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(blocked.json::<Value>()["code"], "STILL_REFERENCED");

    // Video is not listed by any theme
    let deleted = authed(server.delete("/api/v1/categories/3"), &admin).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    assert_eq!(
        deleted.json::<Value>()["message"],
        "Category deleted successfully"
    );
}

#[tokio::test]
async fn test_category_used_only_by_a_block_is_guarded() {
    let server = setup_server().await;
    let (admin, theme) = seed_catalogue(&server).await;

    // Travel lists Text and Photo; the Video block rides along
    let created = authed(server.post("/api/v1/contents"), &admin)
        .json(&content_body(
            "Porto",
            theme,
            json!([
                { "category": 1, "data": "intro" },
                { "category": 3, "data": "clip" },
            ]),
        ))
        .await;
    assert_eq!(created.status_code(), StatusCode::OK);

    let blocked = authed(server.delete("/api/v1/categories/3"), &admin).await;
    assert_eq!(blocked.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = blocked.json::<Value>();
    assert_eq!(body["code"], "STILL_REFERENCED");
    assert_eq!(
        body["message"],
        "Cannot delete category 3: still referenced by 1 content block(s)"
    );

    let video = authed(server.get("/api/v1/categories/3"), &admin).await;
    assert_eq!(video.json::<Value>()["object"]["name"], "Video");
}

#[tokio::test]
async fn test_content_lifecycle() {
    let server = setup_server().await;
    let (admin, theme) = seed_catalogue(&server).await;
    let (creator_id, creator) = user_with_role(&server, &admin, "carla", Some("CREATOR")).await;
    let (_other_id, other) = user_with_role(&server, &admin, "otto", Some("CREATOR")).await;

    // None of the submitted categories is listed by the theme
    let rejected = authed(server.post("/api/v1/contents"), &creator)
        .json(&content_body("Lisbon", theme, json!([{ "category": 3, "data": "clip" }])))
        .await;
    assert_eq!(rejected.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rejected.json::<Value>()["code"], "CATEGORY_NOT_ALLOWED");

    let created = authed(server.post("/api/v1/contents"), &creator)
        .json(&content_body(
            "Lisbon",
            theme,
            json!([
                { "category": 1, "data": "one" },
                { "category": 1, "data": "two" },
                { "category": 2, "data": "three" },
            ]),
        ))
        .await;
    assert_eq!(created.status_code(), StatusCode::OK);
    let created = created.json::<Value>()["object"].clone();
    let content_id = created["id"].as_i64().unwrap();
    let first_block = created["contentType"][0].as_i64().unwrap();
    assert_eq!(created["creator"], creator_id);

    // Another creator may neither edit nor delete it
    let hijack = authed(server.put(&format!("/api/v1/contents/{content_id}")), &other)
        .json(&content_body("Hijacked", theme, json!([{ "category": 1, "data": "x" }])))
        .await;
    assert_eq!(hijack.status_code(), StatusCode::FORBIDDEN);
    let delete = authed(server.delete(&format!("/api/v1/contents/{content_id}")), &other).await;
    assert_eq!(delete.status_code(), StatusCode::FORBIDDEN);

    // Keep the first block, add one, drop the other two
    let updated = authed(server.put(&format!("/api/v1/contents/{content_id}")), &creator)
        .json(&content_body(
            "Lisbon in spring",
            theme,
            json!([
                { "id": first_block, "category": 2, "data": "one, edited" },
                { "category": 1, "data": "new" },
            ]),
        ))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    let blocks = updated.json::<Value>()["object"]["contentType"].clone();
    assert_eq!(blocks.as_array().unwrap().len(), 2);
    assert_eq!(blocks[0], first_block);

    let detail = authed(server.get(&format!("/api/v1/contents/{content_id}")), &other).await;
    let detail = detail.json::<Value>()["object"].clone();
    assert_eq!(detail["title"], "Lisbon in spring");
    assert_eq!(detail["creator"]["username"], "carla");
    assert_eq!(detail["theme"]["name"], "Travel");
    assert_eq!(detail["contentType"][0]["data"], "one, edited");
    assert_eq!(detail["contentType"][0]["category"]["name"], "Photo");
    assert_eq!(detail["contentType"][1]["data"], "new");

    // Listing filters on creator
    let listed = server
        .get("/api/v1/contents")
        .add_query_param("field", "creator")
        .add_query_param("value", creator_id)
        .await;
    assert_eq!(listed.json::<Value>()["object"].as_array().unwrap().len(), 1);

    let theme_delete = authed(server.delete(&format!("/api/v1/themes/{theme}")), &admin).await;
    assert_eq!(theme_delete.json::<Value>()["code"], "STILL_REFERENCED");

    let deleted = authed(server.delete(&format!("/api/v1/contents/{content_id}")), &creator).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    let gone = authed(server.get(&format!("/api/v1/contents/{content_id}")), &creator).await;
    assert_eq!(gone.json::<Value>()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_user_update_rules() {
    let server = setup_server().await;
    register(&server, "admin").await;
    let admin = login(&server, "admin").await;
    let (ana_id, ana) = user_with_role(&server, &admin, "ana", None).await;
    let (bob_id, _bob) = user_with_role(&server, &admin, "bob", None).await;

    let own = authed(server.put(&format!("/api/v1/users/{ana_id}")), &ana)
        .json(&json!({ "email": "ana@new.example.com" }))
        .await;
    assert_eq!(own.status_code(), StatusCode::OK);
    assert_eq!(own.json::<Value>()["object"]["email"], "ana@new.example.com");

    let other = authed(server.put(&format!("/api/v1/users/{bob_id}")), &ana)
        .json(&json!({ "email": "bob@new.example.com" }))
        .await;
    assert_eq!(other.status_code(), StatusCode::FORBIDDEN);

    let promote = authed(server.put(&format!("/api/v1/users/{ana_id}")), &ana)
        .json(&json!({ "role": "ADMIN" }))
        .await;
    assert_eq!(promote.status_code(), StatusCode::FORBIDDEN);

    let empty = authed(server.put(&format!("/api/v1/users/{ana_id}")), &ana)
        .json(&json!({}))
        .await;
    assert_eq!(empty.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_user_list_rejects_exact_match_filter() {
    let server = setup_server().await;
    register(&server, "admin").await;
    let admin = login(&server, "admin").await;

    let filtered = authed(server.get("/api/v1/users"), &admin)
        .add_query_param("field", "role")
        .add_query_param("value", "ADMIN")
        .await;
    assert_eq!(filtered.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = filtered.json::<Value>();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["message"], "Unknown filter field: role");

    let sorted = authed(server.get("/api/v1/users"), &admin)
        .add_query_param("sort", "role")
        .await;
    assert_eq!(sorted.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_deletes_user_with_content() {
    let server = setup_server().await;
    let (admin, theme) = seed_catalogue(&server).await;
    let (creator_id, creator) = user_with_role(&server, &admin, "carla", Some("CREATOR")).await;

    let created = authed(server.post("/api/v1/contents"), &creator)
        .json(&content_body("Lisbon", theme, json!([{ "category": 1, "data": "intro" }])))
        .await;
    assert_eq!(created.status_code(), StatusCode::OK);

    let deleted = authed(server.delete(&format!("/api/v1/users/{creator_id}")), &admin).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let contents = server.get("/api/v1/contents").await;
    assert!(contents.json::<Value>()["object"].as_array().unwrap().is_empty());
    // The deleted user's sessions went with them
    let me = authed(server.get("/api/v1/auth/me"), &creator).await;
    assert_eq!(me.status_code(), StatusCode::FORBIDDEN);
}
