//! HTTP handler tests driven through the router with `oneshot`

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use boardsync_common::models::{FormField, FormFieldType, PropertyMap, PropertyValue, RelationLimit};
use boardsync_engine::store::sqlite::seed;
use boardsync_engine::store::CardStore;
use boardsync_engine::{build_router, AppState};
use helpers::{card_with, plain_board, proposal, proposal_board, relation_property, test_env, TestEnv};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

fn app(env: &TestEnv) -> Router {
    build_router(AppState::new(env.service.clone(), env.bus.clone()))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = test_env().await;
    let (status, body) = send(app(&env), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "boardsync");
}

#[tokio::test]
async fn test_sync_endpoint_reports_counts() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    for i in 0..3 {
        seed::upsert_proposal(&env.pool, &proposal(&env, &format!("P{}", i), i)).await.unwrap();
    }

    let (status, body) = send(app(&env), "POST", &format!("/api/boards/{}/sync", board.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], 3);
    assert_eq!(body["deleted"], 0);
    assert_eq!(body["board_id"], board.id.to_string());
}

#[tokio::test]
async fn test_schema_endpoint_returns_properties() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;

    let (status, body) = send(app(&env), "POST", &format!("/api/boards/{}/schema", board.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = body["card_properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"proposalStatus"));
    assert!(types.contains(&"proposalUrl"));
}

#[tokio::test]
async fn test_error_statuses() {
    let env = test_env().await;
    let plain = plain_board(&env, "Tasks", Vec::new()).await;

    let (status, body) = send(app(&env), "POST", &format!("/api/boards/{}/sync", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(app(&env), "POST", &format!("/api/boards/{}/sync", plain.id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_card_endpoint_omits_private_fields() {
    let env = test_env().await;
    let board = proposal_board(&env, false).await;
    let field = FormField {
        id: "email".to_string(),
        form_id: Uuid::new_v4(),
        name: "Contact".to_string(),
        field_type: FormFieldType::Email,
        options: Vec::new(),
        private: true,
        description: None,
    };
    seed::insert_form_field(&env.pool, env.space_id, 0, &field).await.unwrap();
    let mut p = proposal(&env, "Grant", 0);
    p.form_answers.insert("email".to_string(), PropertyValue::Text("a@b.c".to_string()));
    seed::upsert_proposal(&env.pool, &p).await.unwrap();
    let member = Uuid::new_v4();
    seed::add_space_member(&env.pool, env.space_id, member, false).await.unwrap();

    env.service.sync_board(board.id).await.unwrap();
    let board = env.cards.get_board(board.id).await.unwrap().unwrap();
    let email_id = board
        .fields
        .card_properties
        .iter()
        .find(|t| t.form_field_id.as_deref() == Some("email"))
        .unwrap()
        .id
        .clone();
    let card_id = env.cards.list_synced_cards(board.id).await.unwrap()[&p.id].id;

    let uri = |viewer: Uuid| format!("/api/cards/{}?viewer={}", card_id, viewer);

    let (status, body) = send(app(&env), "GET", &uri(p.authors[0]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"][&email_id], "a@b.c");

    let (status, body) = send(app(&env), "GET", &uri(member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["properties"].get(&email_id).is_none());

    let (status, _) = send(app(&env), "GET", &uri(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_relation_endpoints() {
    let env = test_env().await;
    let y = plain_board(&env, "Milestones", Vec::new()).await;
    let x = plain_board(&env, "Projects", vec![relation_property("rel", y.id, RelationLimit::SinglePage)]).await;
    let a1 = card_with(&env, &x, "A1", PropertyMap::new()).await;
    let b1 = card_with(&env, &y, "B1", PropertyMap::new()).await;
    let b2 = card_with(&env, &y, "B2", PropertyMap::new()).await;

    let (status, _) = send(
        app(&env),
        "POST",
        &format!("/api/boards/{}/relations/rel", x.id),
        Some(serde_json::json!({"label": "Projects"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let cards_uri = format!("/api/boards/{}/relations/rel/cards/{}", x.id, a1.id);
    let (status, body) = send(
        app(&env),
        "PUT",
        &cards_uri,
        Some(serde_json::json!({"card_ids": [b1.id, b2.id]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");

    let (status, body) = send(app(&env), "PUT", &cards_uri, Some(serde_json::json!({"card_ids": [b1.id]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"]["rel"], serde_json::json!([b1.id.to_string()]));

    let (status, body) = send(
        app(&env),
        "DELETE",
        &format!("/api/boards/{}/relations/rel?remove_both=true", x.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let remaining = body["fields"]["cardProperties"].as_array().unwrap();
    assert!(remaining.is_empty());
}
