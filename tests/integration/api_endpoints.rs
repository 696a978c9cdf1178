//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Both query endpoints return the documented JSON shapes
//! - Invalid requests are rejected with 400 and an error body
//! - Storage failures surface as 500 with an error body

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetwatch::{
    HostMetrics,
    api::{ApiConfig, ApiState, spawn_api_server},
    query::QueryService,
    storage::{
        MetricRecord, NewMetricRecord, QueryRange, StorageBackend, StorageError, StorageResult,
        backend::HealthStatus, memory::MemoryBackend,
    },
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn spawn_test_api(backend: Arc<dyn StorageBackend>) -> SocketAddr {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    spawn_api_server(config, ApiState::new(QueryService::new(backend)))
        .await
        .unwrap()
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 23, 2, 30, 0).unwrap()
}

async fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    for (minutes, cpu) in [(0, 10.154), (10, 20.0)] {
        backend
            .insert_batch(vec![
                NewMetricRecord {
                    timestamp: t0() + Duration::minutes(minutes),
                    host_id: "server_1".to_string(),
                    metrics: HostMetrics {
                        cpu_usage_pct: Some(cpu),
                        memory_usage_pct: Some(70.91904),
                        disk_usage_pct: Some(6.542056),
                        network_received: Some(15.5),
                        network_sent: Some(16.5),
                    },
                },
                NewMetricRecord {
                    timestamp: t0() + Duration::minutes(minutes),
                    host_id: "server_2".to_string(),
                    metrics: HostMetrics::default(),
                },
            ])
            .await
            .unwrap();
    }
    backend
}

/// Store that fails every read
struct BrokenBackend;

#[async_trait::async_trait]
impl StorageBackend for BrokenBackend {
    async fn insert_batch(&self, _records: Vec<NewMetricRecord>) -> StorageResult<()> {
        Ok(())
    }

    async fn query_range(&self, _query: QueryRange) -> StorageResult<Vec<MetricRecord>> {
        Err(StorageError::QueryFailed("database is locked".to_string()))
    }

    async fn query_latest_per_host(&self) -> StorageResult<Vec<MetricRecord>> {
        Err(StorageError::QueryFailed("database is locked".to_string()))
    }

    async fn newest_timestamp(&self) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(None)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Err(StorageError::ConnectionFailed("pool closed".to_string()))
    }

    async fn get_stats(&self) -> StorageResult<String> {
        Ok(String::new())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

async fn post_historical(addr: SocketAddr, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/historical_data"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_current_metrics() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = reqwest::get(format!("http://{addr}/api/current_metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "server_1": {
                "timestamp": "2025-04-23T02:40:00Z",
                "cpu_usage": 20.0,
                "network_received": 15.5,
                "network_sent": 16.5,
                "disk_usage": 6.54,
                "memory_usage": 70.92,
            },
            "server_2": {
                "timestamp": "2025-04-23T02:40:00Z",
                "cpu_usage": null,
                "network_received": null,
                "network_sent": null,
                "disk_usage": null,
                "memory_usage": null,
            },
        })
    );
}

#[tokio::test]
async fn test_current_metrics_empty_store() {
    let addr = spawn_test_api(Arc::new(MemoryBackend::new())).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/current_metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_historical_cpu() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = post_historical(
        addr,
        json!({
            "metric": "cpu",
            "server": "server_1",
            "start_time": "2025-04-23T02:00",
            "end_time": "2025-04-23T03:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "timestamps": ["2025-04-23T02:30:00Z", "2025-04-23T02:40:00Z"],
            "values": [10.15, 20.0],
        })
    );
}

#[tokio::test]
async fn test_historical_network_fills_zero() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = post_historical(
        addr,
        json!({
            "metric": "network",
            "server": "server_2",
            "start_time": "2025-04-23T02:00:00Z",
            "end_time": "2025-04-23T03:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "timestamps": ["2025-04-23T02:30:00Z", "2025-04-23T02:40:00Z"],
            "sent": [0.0, 0.0],
            "received": [0.0, 0.0],
        })
    );
}

#[tokio::test]
async fn test_historical_invalid_metric() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = post_historical(
        addr,
        json!({
            "metric": "bogus",
            "server": "server_1",
            "start_time": "2025-04-23T02:00:00Z",
            "end_time": "2025-04-23T03:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "invalid metric type: bogus"}));
}

#[tokio::test]
async fn test_historical_invalid_timestamp() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = post_historical(
        addr,
        json!({
            "metric": "cpu",
            "server": "server_1",
            "start_time": "last tuesday",
            "end_time": "2025-04-23T03:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("last tuesday"));
}

#[tokio::test]
async fn test_historical_malformed_body() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/historical_data"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    let response = post_historical(addr, json!({"metric": "cpu"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_500() {
    let addr = spawn_test_api(Arc::new(BrokenBackend)).await;

    let response = reqwest::get(format!("http://{addr}/api/current_metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("database is locked"));

    let response = post_historical(
        addr,
        json!({
            "metric": "disk",
            "server": "server_1",
            "start_time": "2025-04-23T02:00:00Z",
            "end_time": "2025-04-23T03:00:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health() {
    let addr = spawn_test_api(seeded_backend().await).await;

    let response = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stats"], "In-Memory: 4 records across 2 hosts");
}
