use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{self, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use todo_server::{AppState, MemoryStore, StoreConfig, TodoStore, app};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn test_app() -> Router {
    let store = MemoryStore::connect(StoreConfig::default()).unwrap();
    app(AppState::new(Arc::new(store)))
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(body) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

async fn register(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/users",
            None,
            Some(json!({ "name": name, "email": email })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["user"]["id"].as_str().unwrap().to_string()
}

async fn create(app: &Router, user: &str, body: Value) -> Value {
    let (status, body) = send(app, request("POST", "/api/todos", Some(user), Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["todo"].clone()
}

fn error_fields(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap().to_string())
        .collect()
}

// --- health / users ---

#[tokio::test]
async fn health_check_is_public() {
    let app = test_app();
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = test_app();
    register(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/users",
            None,
            Some(json!({ "name": "Other", "email": "ALICE@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["email"]);
}

#[tokio::test]
async fn register_reports_every_bad_field() {
    let app = test_app();
    let (status, body) = send(
        &app,
        request("POST", "/api/users", None, Some(json!({ "email": "nope" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    let fields = error_fields(&body);
    assert!(fields.contains(&"name".to_string()));
    assert!(fields.contains(&"email".to_string()));
}

// --- auth ---

#[tokio::test]
async fn todos_require_a_known_caller() {
    let app = test_app();

    let (status, body) = send(&app, request("GET", "/api/todos", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let stranger = uuid::Uuid::new_v4().to_string();
    let (status, _) = send(&app, request("GET", "/api/todos", Some(&stranger), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_token_is_accepted() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let req = Request::builder()
        .uri("/api/todos/stats/summary")
        .header(http::header::AUTHORIZATION, format!("Bearer {alice}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["total"], 0);
}

// --- create ---

#[tokio::test]
async fn create_applies_defaults() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        request("POST", "/api/todos", Some(&alice), Some(json!({ "title": "Buy milk" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Todo created successfully");

    let todo = &body["data"]["todo"];
    assert_eq!(todo["title"], "Buy milk");
    assert_eq!(todo["owner"], alice.as_str());
    assert_eq!(todo["isCompleted"], false);
    assert_eq!(todo["priority"], 2);
    assert_eq!(todo["priorityLabel"], "Medium");
    assert_eq!(todo["category"], "General");
    assert_eq!(todo["tags"], json!([]));
    assert_eq!(todo["status"], "pending");
    assert_eq!(todo["isOverdue"], false);
    assert_eq!(todo["daysUntilDue"], Value::Null);
}

#[tokio::test]
async fn title_length_is_bounded() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        request("POST", "/api/todos", Some(&alice), Some(json!({ "title": "" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["title"]);

    create(&app, &alice, json!({ "title": "a".repeat(200) })).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/todos",
            Some(&alice),
            Some(json!({ "title": "a".repeat(201) })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["title"]);
}

#[tokio::test]
async fn create_rejects_bad_priority_and_tags() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/todos",
            Some(&alice),
            Some(json!({ "title": "t", "priority": 4 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["priority"]);

    let tags: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/todos",
            Some(&alice),
            Some(json!({ "title": "t", "tags": tags })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["tags"]);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/todos")
        .header("x-user-id", &alice)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_accepts_datetime_local_due_date() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    for raw in ["2030-04-01T10:30", "2030-04-01T10:30Z", "2030-04-01 10:30:00"] {
        let todo = create(&app, &alice, json!({ "title": "t", "dueDate": raw })).await;
        assert_eq!(todo["dueDate"], "2030-04-01T10:30:00Z", "{raw}");
    }
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let big = json!({ "title": "t", "description": "d".repeat(3 * 1024 * 1024) });
    let (status, body) = send(&app, request("POST", "/api/todos", Some(&alice), Some(big))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}

// --- read ---

#[tokio::test]
async fn list_is_scoped_sorted_and_paginated() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    create(&app, &alice, json!({ "title": "low", "priority": 1 })).await;
    create(&app, &alice, json!({ "title": "high", "priority": 3 })).await;
    create(&app, &alice, json!({ "title": "medium" })).await;
    create(&app, &bob, json!({ "title": "bob's" })).await;

    let (status, body) = send(&app, request("GET", "/api/todos", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["data"]["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["high", "medium", "low"]);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["stats"]["total"], 3);
    assert_eq!(body["data"]["stats"]["highPriority"], 1);

    let (_, body) = send(
        &app,
        request("GET", "/api/todos?page=2&limit=2", Some(&alice), None),
    )
    .await;
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["page"], 2);
    assert_eq!(pagination["limit"], 2);
    assert_eq!(pagination["totalPages"], 2);
    assert_eq!(body["data"]["todos"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_filters_by_search_and_priority() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    create(&app, &alice, json!({ "title": "Buy MILK", "priority": 1 })).await;
    create(&app, &alice, json!({ "title": "Walk dog", "description": "milk run after" })).await;
    create(&app, &alice, json!({ "title": "Read" })).await;

    let (_, body) = send(
        &app,
        request("GET", "/api/todos?search=milk", Some(&alice), None),
    )
    .await;
    assert_eq!(body["data"]["todos"].as_array().unwrap().len(), 2);

    let (_, body) = send(
        &app,
        request("GET", "/api/todos?search=milk&priority=1", Some(&alice), None),
    )
    .await;
    let todos = body["data"]["todos"].as_array().unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0]["title"], "Buy MILK");
}

#[tokio::test]
async fn list_rejects_out_of_range_params() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let (status, body) = send(
        &app,
        request("GET", "/api/todos?limit=101&priority=9", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["location"], "query");
}

#[tokio::test]
async fn undecodable_query_uses_the_envelope() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let (status, body) = send(
        &app,
        request("GET", "/api/todos?page=1&page=2", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    assert_eq!(body["errors"][0]["location"], "query");
}

#[tokio::test]
async fn unsupported_method_uses_the_envelope() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let (status, body) = send(
        &app,
        request("POST", "/api/todos/clear-completed", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Method not allowed");
}

#[tokio::test]
async fn get_one_hides_other_owners_todos() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "private" })).await;
    let uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

    let (status, _) = send(&app, request("GET", &uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request("GET", &uri, Some(&bob), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Todo not found");
}

#[tokio::test]
async fn malformed_id_is_not_found() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let (status, body) = send(&app, request("GET", "/api/todos/not-an-id", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Todo not found");
}

// --- update / toggle / delete ---

#[tokio::test]
async fn update_changes_only_given_fields() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let todo = create(
        &app,
        &alice,
        json!({ "title": "draft", "description": "keep me", "dueDate": "2030-01-01" }),
    )
    .await;
    let uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &uri,
            Some(&alice),
            Some(json!({ "title": "final", "priority": 3, "dueDate": null })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Todo updated successfully");
    let updated = &body["data"]["todo"];
    assert_eq!(updated["title"], "final");
    assert_eq!(updated["description"], "keep me");
    assert_eq!(updated["priorityLabel"], "High");
    assert_eq!(updated["dueDate"], Value::Null);
}

#[tokio::test]
async fn update_by_non_owner_is_not_found() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "mine" })).await;
    let uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        request("PUT", &uri, Some(&bob), Some(json!({ "title": "theirs" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn toggle_twice_restores_pending() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "flip" })).await;
    let uri = format!("/api/todos/{}/toggle", todo["id"].as_str().unwrap());

    let (status, body) = send(&app, request("PATCH", &uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Todo marked as completed");
    assert_eq!(body["data"]["todo"]["isCompleted"], true);
    assert_eq!(body["data"]["todo"]["status"], "completed");
    assert!(body["data"]["todo"]["completedAt"].is_string());

    let (_, body) = send(&app, request("PATCH", &uri, Some(&alice), None)).await;
    assert_eq!(body["message"], "Todo marked as pending");
    assert_eq!(body["data"]["todo"]["isCompleted"], false);
    assert_eq!(body["data"]["todo"]["completedAt"], Value::Null);
}

#[tokio::test]
async fn delete_is_owner_only() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "gone soon" })).await;
    let uri = format!("/api/todos/{}", todo["id"].as_str().unwrap());

    let (status, _) = send(&app, request("DELETE", &uri, Some(&bob), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, request("DELETE", &uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Todo deleted successfully");

    let (status, _) = send(&app, request("GET", &uri, Some(&alice), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_completed_counts_deleted() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let done = create(&app, &alice, json!({ "title": "done" })).await;
    create(&app, &alice, json!({ "title": "open" })).await;

    let (status, body) = send(
        &app,
        request("DELETE", "/api/todos/clear-completed", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cleared 0 completed todos");
    assert_eq!(body["data"]["deletedCount"], 0);

    let toggle = format!("/api/todos/{}/toggle", done["id"].as_str().unwrap());
    send(&app, request("PATCH", &toggle, Some(&alice), None)).await;

    let (_, body) = send(
        &app,
        request("DELETE", "/api/todos/clear-completed", Some(&alice), None),
    )
    .await;
    assert_eq!(body["data"]["deletedCount"], 1);

    let (_, body) = send(&app, request("GET", "/api/todos/stats/summary", Some(&alice), None)).await;
    assert_eq!(body["data"]["stats"]["total"], 1);
    assert_eq!(body["data"]["stats"]["completed"], 0);
}

// --- sharing / notes ---

#[tokio::test]
async fn shared_todo_is_readable_by_recipient() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "together" })).await;
    let id = todo["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/todos/{id}/share"),
            Some(&alice),
            Some(json!({ "user": bob })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["todo"]["sharedWith"][0]["permission"], "read");

    let (status, body) = send(&app, request("GET", &format!("/api/todos/{id}"), Some(&bob), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["todo"]["sharedWith"][0]["user"]["email"], "bob@example.com");

    // Sharing grants visibility only; mutation stays owner-only.
    let (status, _) = send(
        &app,
        request("DELETE", &format!("/api/todos/{id}"), Some(&bob), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The recipient's own list is unaffected.
    let (_, body) = send(&app, request("GET", "/api/todos", Some(&bob), None)).await;
    assert_eq!(body["data"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn share_rejects_self_and_unknown_user() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "solo" })).await;
    let uri = format!("/api/todos/{}/share", todo["id"].as_str().unwrap());

    let (status, body) = send(&app, request("POST", &uri, Some(&alice), Some(json!({ "user": alice })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["user"]);

    let stranger = uuid::Uuid::new_v4();
    let (status, _) = send(
        &app,
        request("POST", &uri, Some(&alice), Some(json!({ "user": stranger }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_note_appends() {
    let app = test_app();
    let alice = register(&app, "Alice", "alice@example.com").await;
    let todo = create(&app, &alice, json!({ "title": "noted" })).await;
    let uri = format!("/api/todos/{}/notes", todo["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        request("POST", &uri, Some(&alice), Some(json!({ "content": "  first  " }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let notes = body["data"]["todo"]["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["content"], "first");
    assert_eq!(notes[0]["author"], alice.as_str());

    let (status, body) = send(&app, request("POST", &uri, Some(&alice), Some(json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_fields(&body), ["content"]);
}

// --- store failures ---

#[tokio::test]
async fn closed_store_is_a_generic_server_error() {
    let store = Arc::new(MemoryStore::connect(StoreConfig::default()).unwrap());
    let app = app(AppState::new(store.clone()));
    let alice = register(&app, "Alice", "alice@example.com").await;
    store.close().await;

    let (status, body) = send(&app, request("GET", "/api/todos", Some(&alice), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Internal server error");
}
