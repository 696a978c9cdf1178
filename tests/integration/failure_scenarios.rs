//! Failure tests for the collection pipeline
//!
//! These tests verify that the system handles failures gracefully:
//! - Unreachable and failing endpoints
//! - Malformed telemetry
//! - Rejected commits

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use fleetwatch::{
    HostMetrics,
    collector::CycleOutcome,
    storage::{StorageBackend, memory::MemoryBackend},
};
use wiremock::{MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_unreachable_host_gets_all_null_record() {
    let healthy = healthy_host().await;
    let backend = Arc::new(MemoryBackend::new());

    let collector = create_collector(
        vec![
            ("server_1", healthy.uri()),
            ("server_2", UNREACHABLE.to_string()),
        ],
        backend.clone(),
    );

    assert_matches!(
        collector.run_cycle().await,
        CycleOutcome::Completed(report) if report.committed && report.complete_records == 1
    );

    let latest = backend.query_latest_per_host().await.unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest[0].metrics.is_complete());
    assert_eq!(latest[1].host_id, "server_2");
    assert_eq!(latest[1].metrics, HostMetrics::default());
}

#[tokio::test]
async fn test_each_chart_fails_independently() {
    let server = MockServer::start().await;
    mount_chart(&server, "system.cpu", data(cpu_row())).await;
    mount_chart(&server, "system.net", ResponseTemplate::new(500)).await;
    mount_chart(
        &server,
        "system.ram",
        ResponseTemplate::new(200).set_body_string("<html>bad gateway</html>"),
    )
    .await;
    mount_chart(
        &server,
        "disk_space./",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
    )
    .await;

    let backend = Arc::new(MemoryBackend::new());
    let collector = create_collector(vec![("server_1", server.uri())], backend.clone());
    collector.run_cycle().await;

    let latest = backend.query_latest_per_host().await.unwrap();
    let metrics = latest[0].metrics;
    assert!((metrics.cpu_usage_pct.unwrap() - 10.15).abs() < 1e-9);
    assert_eq!(metrics.network_received, None);
    assert_eq!(metrics.network_sent, None);
    assert_eq!(metrics.memory_usage_pct, None);
    assert_eq!(metrics.disk_usage_pct, None);
}

#[tokio::test]
async fn test_slow_host_times_out_without_blocking_others() {
    let healthy = healthy_host().await;

    let slow = MockServer::start().await;
    for chart in ["system.cpu", "system.net", "system.ram", "disk_space./"] {
        mount_chart(&slow, chart, data(cpu_row()).set_delay(Duration::from_secs(5))).await;
    }

    let backend = Arc::new(MemoryBackend::new());
    // telemetry timeout is 2s
    let collector = create_collector(
        vec![("server_1", healthy.uri()), ("server_2", slow.uri())],
        backend.clone(),
    );

    let started = std::time::Instant::now();
    collector.run_cycle().await;
    assert!(started.elapsed() < Duration::from_secs(4));

    let latest = backend.query_latest_per_host().await.unwrap();
    assert!(latest[0].metrics.is_complete());
    assert!(latest[1].metrics.is_empty());
}

#[tokio::test]
async fn test_rejected_commit_leaves_nothing_visible() {
    let host = healthy_host().await;
    let backend = Arc::new(FlakyBackend::default());
    let collector = create_collector(vec![("server_1", host.uri())], backend.clone());

    collector.run_cycle().await;
    let before = backend.query_latest_per_host().await.unwrap();

    backend.set_reject_writes(true);
    assert_matches!(
        collector.run_cycle().await,
        CycleOutcome::Completed(report) if !report.committed
    );

    let after = backend.query_latest_per_host().await.unwrap();
    assert_eq!(before, after);
    assert_eq!(
        backend.get_stats().await.unwrap(),
        "In-Memory: 1 records across 1 hosts"
    );

    // the next cycle is independent of the failed one
    backend.set_reject_writes(false);
    assert_matches!(
        collector.run_cycle().await,
        CycleOutcome::Completed(report) if report.committed && report.cycle == 3
    );
}
