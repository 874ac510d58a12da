//! API Smoke Tests
//!
//! Validates that the HTTP API router responds correctly using the
//! in-memory storage backend (no PostgreSQL required).

use std::sync::Arc;

use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use match_tower_server::api::{build_router, ApiState};
use match_tower_server::metrics::ServerMetrics;

fn test_router() -> axum::Router {
    let storage = Arc::new(match_tower_server::storage::init_memory());
    let state = ApiState {
        storage,
        metrics: ServerMetrics::new(),
    };
    build_router(state)
}

async fn request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let resp = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn register(router: &axum::Router, name: &str) -> String {
    let (status, body) = request(
        router,
        "POST",
        "/api/player/register",
        Some(json!({
            "player_name": name,
            "password": "secret123",
            "email": format!("{}@test.io", name.to_lowercase()),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    body["player"]["player_id"].as_str().unwrap().to_string()
}

// ============================================================================
// Health & Metrics
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = test_router();
    let (status, json) = request(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(!json["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoints() {
    let router = test_router();
    let (status, _) = request(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = request(&router, "GET", "/metrics/json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["total_requests"].as_u64().unwrap() >= 1);

    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("match_requests_total"));
}

// ============================================================================
// Registration & Login
// ============================================================================

#[tokio::test]
async fn test_register_assigns_player_id_and_starting_coins() {
    let router = test_router();
    let (status, body) = request(
        &router,
        "POST",
        "/api/player/register",
        Some(json!({
            "player_name": "Mira",
            "password": "hunter2!",
            "email": "mira@test.io",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let id = body["player"]["player_id"].as_str().unwrap();
    assert!(id.starts_with("PLR"));
    assert_eq!(id.len(), 11);
    assert_eq!(body["player"]["coins"], 100);
    assert_eq!(body["player"]["tower_record"], 0);
    // The password hash never appears on the wire.
    assert!(body["player"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_requires_name_and_password() {
    let router = test_router();
    let (status, body) = request(
        &router,
        "POST",
        "/api/player/register",
        Some(json!({ "player_name": "", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let router = test_router();
    register(&router, "First").await;

    let (status, body) = request(
        &router,
        "POST",
        "/api/player/register",
        Some(json!({
            "player_name": "Second",
            "password": "pw",
            "email": "first@test.io",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_login_roundtrip_and_rejection() {
    let router = test_router();
    register(&router, "Kara").await;

    let (status, body) = request(
        &router,
        "POST",
        "/api/player/login",
        Some(json!({ "email": "kara@test.io", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");

    let (status, body) = request(
        &router,
        "POST",
        "/api/player/login",
        Some(json!({ "email": "kara@test.io", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_FAILED");
}

// ============================================================================
// Player lookups & coins
// ============================================================================

#[tokio::test]
async fn test_unknown_player_is_404_with_stable_code() {
    let router = test_router();
    let (status, body) = request(&router, "GET", "/api/player/PLR00000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_update_coins_floors_at_zero() {
    let router = test_router();
    let id = register(&router, "Gil").await;

    let (status, body) = request(
        &router,
        "POST",
        &format!("/api/player/{}/coins", id),
        Some(json!({ "coins_change": -5000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_coins"], 0);

    let (_, body) = request(
        &router,
        "POST",
        &format!("/api/player/{}/coins", id),
        Some(json!({ "coins_change": 75 })),
    )
    .await;
    assert_eq!(body["new_coins"], 75);
}

// ============================================================================
// Catalog endpoints
// ============================================================================

#[tokio::test]
async fn test_weapon_catalog_has_exactly_one_default() {
    let router = test_router();
    let (status, body) = request(&router, "GET", "/api/economy/weapons", None).await;
    assert_eq!(status, StatusCode::OK);

    let weapons = body.as_array().unwrap();
    assert!(weapons.len() >= 3, "catalog should be seeded");
    let defaults: Vec<&Value> = weapons
        .iter()
        .filter(|w| w["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["price"], 0);
}

#[tokio::test]
async fn test_chapter_catalog() {
    let router = test_router();
    let (status, body) = request(&router, "GET", "/api/chapter", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().len() >= 2);

    let (status, body) = request(&router, "GET", "/api/chapter/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chapter_id"], 1);
    assert!(body["levels"].as_array().unwrap().len() >= 2);

    let (status, body) = request(&router, "GET", "/api/chapter/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_seasons_listing() {
    let router = test_router();
    let (status, body) = request(&router, "GET", "/api/leaderboard/seasons", None).await;
    assert_eq!(status, StatusCode::OK);
    let seasons = body.as_array().unwrap();
    assert_eq!(seasons.len(), 1);
    assert_eq!(seasons[0]["is_active"], true);
}
