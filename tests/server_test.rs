mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::MockExecutor;
use graph_explorer::config::Config;
use graph_explorer::server::{build_router, AppState};

fn config() -> Config {
    Config {
        port: 0,
        falkor_host: "localhost".to_string(),
        falkor_port: 6379,
        graph_name: "test".to_string(),
        max_connections: 1,
        query_timeout_ms: 1_000,
        cache_ttl: 300,
        neighbor_cache_ttl: 120,
        cache_sweep_interval: 60,
        cache_max_entries: 100,
        session_idle_timeout: 1_800,
        max_sessions: 100,
        batch_size: 50,
        max_batches: 20,
        preload_threshold: 100,
        parallel_threshold: 5_000,
    }
}

fn app(mock: MockExecutor) -> Router {
    build_router(AppState::new(Arc::new(mock), config()))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn open_session(app: &Router) -> String {
    let (status, body) = call(app, Method::POST, "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = app(MockExecutor::new());
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_session_exploration_flow() {
    let app = app(MockExecutor::chain(4));
    let id = open_session(&app).await;

    let (status, initial) = call(
        &app,
        Method::POST,
        &format!("/sessions/{id}/neighbors/0"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(initial["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(initial["links"][0]["type"], "KNOWS");

    let (_, frontier) = call(
        &app,
        Method::POST,
        &format!("/sessions/{id}/frontier"),
        Some(json!({ "node_ids": ["1"] })),
    )
    .await;
    let ids: Vec<&str> = frontier["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2"]);

    let (_, progress) = call(
        &app,
        Method::GET,
        &format!("/sessions/{id}/progress?total_nodes=4&visible=3"),
        None,
    )
    .await;
    assert_eq!(progress["loadedNodes"], 3);
    assert_eq!(progress["progress"], 0.75);
    assert_eq!(progress["batchCount"], 2);
    assert_eq!(progress["shouldLoadMore"], true);

    let (status, _) = call(&app, Method::DELETE, &format!("/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = call(&app, Method::POST, &format!("/sessions/{id}/neighbors/0"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_paginate_endpoint() {
    let app = app(MockExecutor::new().with_rows(25));
    let id = open_session(&app).await;

    let (status, page) = call(
        &app,
        Method::POST,
        &format!("/sessions/{id}/paginate"),
        Some(json!({ "query": "MATCH (n) RETURN n", "limit": 10, "skip": 20 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 5);
    assert_eq!(page["total"], 25);
    assert_eq!(page["hasMore"], false);
    assert_eq!(page["data"][0]["n"], 20);
}

#[tokio::test]
async fn test_clear_cache_without_body() {
    let app = app(MockExecutor::chain(2));
    let id = open_session(&app).await;
    call(&app, Method::POST, &format!("/sessions/{id}/neighbors/0"), None).await;

    let (status, body) = call(&app, Method::POST, &format!("/sessions/{id}/cache/clear"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);
}

#[tokio::test]
async fn test_indexes_round_trip_through_schema_helpers() {
    let app = app(MockExecutor::new().with_index("Person", "name"));

    let (status, indexes) = call(&app, Method::GET, "/indexes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(indexes[0]["label"], "Person");
    assert_eq!(indexes[0]["indexType"], "RANGE");

    let (status, _) = call(
        &app,
        Method::POST,
        "/indexes",
        Some(json!({ "label": "Bad Label", "property": "name" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_render_returns_display_list() {
    let app = app(MockExecutor::new());

    let (status, body) = call(
        &app,
        Method::POST,
        "/render",
        Some(json!({
            "graph": {
                "nodes": [
                    { "id": "a", "labels": ["Person"], "x": 10.0, "y": 10.0 },
                    { "id": "b", "labels": ["Movie"], "x": 60.0, "y": 40.0 }
                ],
                "links": [{ "id": "ab", "type": "ACTED_IN", "startNode": "a", "endNode": "b" }]
            },
            "transform": { "x": 0.0, "y": 0.0, "k": 0.2 },
            "width": 400.0,
            "height": 300.0
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["mode"], "dots");
    assert_eq!(body["stats"]["visible_nodes"], 2);
    assert_eq!(body["commands"][0]["op"], "save");
}

#[tokio::test]
async fn test_render_rejects_unordered_thresholds() {
    let app = app(MockExecutor::new());

    let (status, _) = call(
        &app,
        Method::POST,
        "/render",
        Some(json!({
            "graph": { "nodes": [] },
            "transform": { "x": 0.0, "y": 0.0, "k": 1.0 },
            "width": 100.0,
            "height": 100.0,
            "lod": { "thresholds": { "dotMode": 1.0, "simpleMode": 0.5, "labelMode": 2.0 } }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_are_reaped() {
    let state = AppState::new(Arc::new(MockExecutor::chain(3)), config());
    let app = build_router(state.clone());
    let idle = open_session(&app).await;
    let active = open_session(&app).await;
    let reaper = state.spawn_session_reaper().unwrap();
    tokio::task::yield_now().await;

    tokio::time::advance(Duration::from_secs(1_000)).await;
    let (status, _) = call(&app, Method::POST, &format!("/sessions/{active}/neighbors/0"), None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::advance(Duration::from_secs(900)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert_eq!(state.sessions.len(), 1);
    let (status, _) = call(&app, Method::POST, &format!("/sessions/{idle}/neighbors/0"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::POST, &format!("/sessions/{active}/neighbors/1"), None).await;
    assert_eq!(status, StatusCode::OK);
    reaper.abort();
}

#[tokio::test(start_paused = true)]
async fn test_session_limit_refuses_until_idle_sessions_expire() {
    let state = AppState::new(
        Arc::new(MockExecutor::new()),
        Config {
            max_sessions: 2,
            ..config()
        },
    );
    let app = build_router(state.clone());
    open_session(&app).await;
    open_session(&app).await;

    let (status, body) = call(&app, Method::POST, "/sessions", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["status"], 429);

    tokio::time::advance(Duration::from_secs(1_801)).await;
    open_session(&app).await;
    assert_eq!(state.sessions.len(), 1);
}
