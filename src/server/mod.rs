// SPDX-License-Identifier: MIT

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::filter::{BatchSummary, CollectingSink, FilterConfig, FilterHandle, Signal};

pub fn router(handle: FilterHandle) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/config", get(get_config).put(put_config))
        .route("/api/signals", post(process_signals))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(handle)
}

pub async fn serve(
    handle: FilterHandle,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(handle);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_config(State(handle): State<FilterHandle>) -> Json<FilterConfig> {
    Json(handle.config().await)
}

async fn put_config(
    State(handle): State<FilterHandle>,
    Json(config): Json<FilterConfig>,
) -> (StatusCode, Json<Value>) {
    let conditions = config.conditions.len();
    let operator = config.operator;
    match handle.reconfigure(config).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "configured",
                "conditions": conditions,
                "operator": operator,
            })),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Response body for a processed batch; only non-empty channels appear
#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub outputs: BTreeMap<String, Vec<Signal>>,
    pub summary: BatchSummary,
}

async fn process_signals(
    State(handle): State<FilterHandle>,
    Json(signals): Json<Vec<Signal>>,
) -> Json<SignalsResponse> {
    let mut sink = CollectingSink::new();
    let summary = handle.process(signals, &mut sink).await;
    log::info!(
        "Processed {} signals: {} passed, {} failed",
        summary.received,
        summary.passed,
        summary.failed
    );

    Json(SignalsResponse {
        outputs: sink.into_outputs(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CombinationPolicy, DEFAULT_OUTPUT, FALSE_OUTPUT};

    fn handle(conditions: &[&str]) -> FilterHandle {
        FilterHandle::new(FilterConfig::new(
            conditions.iter().copied(),
            CombinationPolicy::All,
        ))
        .unwrap()
    }

    fn signals(values: &[i64]) -> Vec<Signal> {
        values
            .iter()
            .map(|v| Signal::empty().with("val", *v))
            .collect()
    }

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_process_signals_returns_non_empty_channels() {
        let handle = handle(&["val % 2 == 0"]);
        let Json(response) = process_signals(State(handle), Json(signals(&[1, 2, 3, 4]))).await;

        assert_eq!(response.outputs[DEFAULT_OUTPUT].len(), 2);
        assert_eq!(response.outputs[FALSE_OUTPUT].len(), 2);
        assert_eq!(response.summary.received, 4);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["outputs"]["default"], json!([{"val": 2}, {"val": 4}]));
        assert_eq!(body["summary"]["passed"], json!(2));
    }

    #[tokio::test]
    async fn test_process_signals_omits_empty_channel() {
        let handle = handle(&["val > 0"]);
        let Json(response) = process_signals(State(handle), Json(signals(&[1, 2]))).await;
        assert!(!response.outputs.contains_key(FALSE_OUTPUT));
    }

    #[tokio::test]
    async fn test_put_config_reconfigures() {
        let handle = handle(&["val > 0"]);
        let config: FilterConfig =
            serde_json::from_value(json!({"conditions": ["val < 0", "val == 5"], "operator": "any"}))
                .unwrap();

        let (status, Json(body)) = put_config(State(handle.clone()), Json(config)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conditions"], json!(2));
        assert_eq!(body["operator"], json!("ANY"));

        let Json(current) = get_config(State(handle)).await;
        assert_eq!(current.operator, CombinationPolicy::Any);
    }

    #[tokio::test]
    async fn test_put_oversized_condition_is_bad_request() {
        let handle = handle(&["val > 0"]);
        let chain = format!("{}val{} > 0", "(".repeat(50_000), ")".repeat(50_000));
        let config = FilterConfig::new([chain.as_str()], CombinationPolicy::All);

        let (status, _) = put_config(State(handle.clone()), Json(config)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let Json(response) = process_signals(State(handle), Json(signals(&[1]))).await;
        assert_eq!(response.summary.passed, 1);
    }

    #[tokio::test]
    async fn test_put_invalid_config_is_bad_request() {
        let handle = handle(&["val > 0"]);
        let config = FilterConfig::new(["val >"], CombinationPolicy::All);

        let (status, Json(body)) = put_config(State(handle.clone()), Json(config)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("failed to compile"));

        let Json(current) = get_config(State(handle)).await;
        assert_eq!(current.conditions[0].expr(), "val > 0");
    }
}
