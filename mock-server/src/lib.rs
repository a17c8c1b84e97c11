//! Scripted stub API for exercising the fetch core over real HTTP.
//!
//! Every endpoint behaves deterministically so tests can pin down status
//! classification, decoding, timeouts and retries. `/flaky` keeps a per-key
//! hit counter so a test can make an endpoint fail a fixed number of times
//! and then read back how many attempts arrived.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

pub type Counters = Arc<RwLock<HashMap<String, u32>>>;

pub fn app() -> Router {
    let counters: Counters = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/json", get(fixed_json))
        .route("/text", get(not_json))
        .route("/empty", get(empty))
        .route("/status/{code}", get(status))
        .route("/delay/{ms}", get(delayed))
        .route("/query", get(echo_query))
        .route("/echo", get(echo_method).post(echo_body).put(echo_body).patch(echo_body))
        .route("/flaky/{key}/{failures}", get(flaky))
        .route("/hits/{key}", get(hits))
        .with_state(counters)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn fixed_json() -> Json<Value> {
    Json(json!({"a": 1}))
}

async fn not_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "not-json")
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(json!({"error": format!("status {code}")}))))
}

async fn delayed(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({"delayed_ms": ms}))
}

async fn echo_query(Query(pairs): Query<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(pairs)
}

async fn echo_method() -> Json<Value> {
    Json(json!({"method": "GET"}))
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"echo": body}))
}

async fn flaky(
    State(counters): State<Counters>,
    Path((key, failures)): Path<(String, u32)>,
) -> (StatusCode, Json<Value>) {
    let hit = {
        let mut counters = counters.write().await;
        let count = counters.entry(key.clone()).or_insert(0);
        *count += 1;
        *count
    };
    debug!(key = %key, hit, failures, "flaky endpoint hit");
    if hit <= failures {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "try again", "hit": hit})),
        )
    } else {
        (StatusCode::OK, Json(json!({"hit": hit})))
    }
}

async fn hits(State(counters): State<Counters>, Path(key): Path<String>) -> Json<Value> {
    let count = counters.read().await.get(&key).copied().unwrap_or(0);
    Json(json!({"hits": count}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flaky_fails_then_recovers() {
        let counters: Counters = Arc::new(RwLock::new(HashMap::new()));
        let call = || flaky(State(counters.clone()), Path(("k".to_string(), 2)));

        assert_eq!(call().await.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(call().await.0, StatusCode::SERVICE_UNAVAILABLE);
        let (status, Json(body)) = call().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hit"], 3);
    }

    #[tokio::test]
    async fn hits_defaults_to_zero() {
        let counters: Counters = Arc::new(RwLock::new(HashMap::new()));
        let Json(body) = hits(State(counters), Path("unknown".to_string())).await;
        assert_eq!(body["hits"], 0);
    }

    #[tokio::test]
    async fn status_rejects_out_of_range_codes() {
        assert!(status(Path(42)).await.is_err());
        let (code, Json(body)) = status(Path(418)).await.unwrap();
        assert_eq!(code, StatusCode::IM_A_TEAPOT);
        assert_eq!(body["error"], "status 418");
    }
}
