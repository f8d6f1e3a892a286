use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use todo_server::{app, router, AppState, TodoItem};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn delete(uri: &str) -> Request<String> {
    Request::builder().method("DELETE").uri(uri).body(String::new()).unwrap()
}

/// Send one request through a shared router.
async fn send(app: &axum::Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

// --- list ---

#[tokio::test]
async fn list_items_contains_seed() {
    let resp = app().oneshot(get("/api/items")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let items: Vec<TodoItem> = body_json(resp).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, 1);
    assert_eq!(items[0].name, "Item1");
    assert!(items[0].is_complete);
    assert_eq!(items[0].values.len(), 1);
    assert_eq!(items[0].values[0].value, 22.0);
}

#[tokio::test]
async fn list_items_empty_without_seed() {
    let resp = router(AppState::new(false)).oneshot(get("/api/items")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let items: Vec<TodoItem> = body_json(resp).await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn list_items_with_filter() {
    let app = app();
    send(&app, json_request("POST", "/api/items", r#"{"id":2,"name":"Open","isComplete":false}"#)).await;

    let resp = send(&app, get("/api/items?$filter=isComplete%20eq%20true")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let items: Vec<TodoItem> = body_json(resp).await;
    assert!(!items.is_empty());
    assert!(items.iter().all(|item| item.is_complete));
}

#[tokio::test]
async fn list_items_with_paging_and_count() {
    let app = app();
    for id in 2..=5 {
        let body = format!(r#"{{"id":{id},"name":"Item{id}"}}"#);
        send(&app, json_request("POST", "/api/items", &body)).await;
    }

    let resp = send(&app, get("/api/items?$orderby=id%20desc&$top=2&$count=true&$select=id")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["@odata.count"], 5);
    assert_eq!(body["value"], serde_json::json!([{ "id": 5 }, { "id": 4 }]));
}

#[tokio::test]
async fn list_items_top_over_limit_returns_400() {
    let resp = app().oneshot(get("/api/items?$top=101")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let message: String = body_json(resp).await;
    assert!(message.starts_with("Wrong request: "));
}

#[tokio::test]
async fn list_items_bad_filter_returns_400() {
    let resp = app().oneshot(get("/api/items?$filter=color%20eq%20%27red%27")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_items_deeply_nested_filter_returns_400() {
    let uri = format!(
        "/api/items?$filter={}id%20eq%201{}",
        "(".repeat(20_000),
        ")".repeat(20_000)
    );
    let resp = router(AppState::new(false)).oneshot(get(&uri)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let message: String = body_json(resp).await;
    assert!(message.starts_with("Wrong request: "), "{message}");
    assert!(message.contains("nested too deeply"), "{message}");
}

// --- get ---

#[tokio::test]
async fn get_item_not_found() {
    let resp = app().oneshot(get("/api/items/99999")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn get_item_bad_id_returns_400() {
    let resp = app().oneshot(get("/api/items/not-a-number")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- create ---

#[tokio::test]
async fn create_item_returns_201_with_values() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/items",
            r#"{"id":200,"name":"New Test Item","isComplete":false,"values":[{"id":201,"value":42}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers().get(http::header::LOCATION).unwrap(), "/api/items/200");
    let item: TodoItem = body_json(resp).await;
    assert_eq!(item.id, 200);
    assert_eq!(item.name, "New Test Item");
    assert_eq!(item.values.len(), 1);
    assert_eq!(item.values[0].value, 42.0);
    assert_eq!(item.values[0].todo_item_id, Some(200));
}

#[tokio::test]
async fn create_item_defaults_values() {
    let resp = app()
        .oneshot(json_request("POST", "/api/items", r#"{"id":100,"name":"Bare"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let item: TodoItem = body_json(resp).await;
    assert!(item.values.is_empty());
    assert!(!item.is_complete);
}

#[tokio::test]
async fn create_item_duplicate_id_returns_400() {
    let app = app();
    let first = send(&app, json_request("POST", "/api/items", r#"{"id":300,"name":"First Item"}"#)).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let resp = send(&app, json_request("POST", "/api/items", r#"{"id":300,"name":"Duplicate Item"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let message: String = body_json(resp).await;
    assert_eq!(message, "Wrong request: item with id 300 has already been added");
}

#[tokio::test]
async fn create_item_null_body_returns_400() {
    let resp = app().oneshot(json_request("POST", "/api/items", "null")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_item_malformed_json_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/api/items", r#"{"id":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let message: String = body_json(resp).await;
    assert!(message.starts_with("Wrong request: "));
}

#[tokio::test]
async fn create_item_empty_name_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/api/items", r#"{"id":7,"name":"  "}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_item_with_taken_value_id_stores_nothing() {
    let app = app();
    // value 1 belongs to the seed item
    let resp = send(
        &app,
        json_request("POST", "/api/items", r#"{"id":50,"name":"Clash","values":[{"id":1,"value":3}]}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, get("/api/items/50")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- update ---

#[tokio::test]
async fn update_item_returns_updated() {
    let app = app();
    send(&app, json_request("POST", "/api/items", r#"{"id":400,"name":"Original Item"}"#)).await;

    let resp = send(
        &app,
        json_request("PUT", "/api/items/400", r#"{"id":400,"name":"Updated Item","isComplete":true}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let item: TodoItem = body_json(resp).await;
    assert_eq!(item.id, 400);
    assert_eq!(item.name, "Updated Item");
    assert!(item.is_complete);
}

#[tokio::test]
async fn update_item_ignores_values_in_body() {
    let app = app();
    send(
        &app,
        json_request("POST", "/api/items", r#"{"id":410,"name":"Keep","values":[{"id":411,"value":1.5}]}"#),
    )
    .await;

    let resp = send(
        &app,
        json_request(
            "PUT",
            "/api/items/410",
            r#"{"id":410,"name":"Keep","values":[{"id":412,"value":9},{"id":413,"value":8}]}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let item: TodoItem = body_json(resp).await;
    assert_eq!(item.values.len(), 1);
    assert_eq!(item.values[0].id, 411);
    assert_eq!(item.values[0].value, 1.5);

    let resp = send(&app, get("/api/items/410/values/412")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_item_not_found() {
    let resp = app()
        .oneshot(json_request("PUT", "/api/items/99998", r#"{"id":99998,"name":"Nope"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_item_mismatched_id_returns_400() {
    let app = app();
    send(&app, json_request("POST", "/api/items", r#"{"id":200,"name":"Target"}"#)).await;

    let resp = send(&app, json_request("PUT", "/api/items/200", r#"{"id":201,"name":"Target"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_item_null_body_returns_400() {
    let resp = app().oneshot(json_request("PUT", "/api/items/1", "null")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delete ---

#[tokio::test]
async fn delete_item_not_found() {
    let resp = app().oneshot(delete("/api/items/99997")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_item_cascades_to_values() {
    let app = app();
    send(
        &app,
        json_request(
            "POST",
            "/api/items",
            r#"{"id":200,"name":"New Test Item","values":[{"id":201,"value":42}]}"#,
        ),
    )
    .await;

    let resp = send(&app, delete("/api/items/200")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&app, get("/api/items/200/values/201")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(&app, get("/api/items/200")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // the value id is free again
    let resp = send(
        &app,
        json_request("POST", "/api/items", r#"{"id":202,"name":"Reuse","values":[{"id":201,"value":1}]}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn deleted_seed_is_not_reseeded() {
    let app = app();
    let resp = send(&app, delete("/api/items/1")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&app, get("/api/items")).await;
    let items: Vec<TodoItem> = body_json(resp).await;
    assert!(items.is_empty());
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    let app = app();

    // create
    let resp = send(&app, json_request("POST", "/api/items", r#"{"id":700,"name":"Workflow Item"}"#)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: TodoItem = body_json(resp).await;
    assert_eq!(created.name, "Workflow Item");
    assert!(!created.is_complete);

    // get
    let resp = send(&app, get("/api/items/700")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: TodoItem = body_json(resp).await;
    assert_eq!(fetched, created);

    // update
    let resp = send(
        &app,
        json_request("PUT", "/api/items/700", r#"{"id":700,"name":"Workflow Item Done","isComplete":true}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: TodoItem = body_json(resp).await;
    assert_eq!(updated.name, "Workflow Item Done");
    assert!(updated.is_complete);

    // list: seed plus ours
    let resp = send(&app, get("/api/items")).await;
    let items: Vec<TodoItem> = body_json(resp).await;
    assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 700]);

    // delete
    let resp = send(&app, delete("/api/items/700")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // get after delete is 404
    let resp = send(&app, get("/api/items/700")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_check() {
    let resp = app().oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}
