//! Concurrency tests
//!
//! These tests verify that:
//! - Hosts are polled in parallel
//! - Overlapping cycles are refused
//! - Readers only ever see whole cycles

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use fleetwatch::{
    collector::CycleOutcome,
    query::QueryService,
    scheduler::SchedulerHandle,
    storage::{StorageBackend, memory::MemoryBackend},
};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wiremock::matchers::{method, path};

use crate::helpers::*;

async fn slow_host(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": [[1, 10.0, 20.0, 30.0, 40.0]]}))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hosts_are_polled_in_parallel() {
    let mut servers = Vec::new();
    for _ in 0..8 {
        servers.push(slow_host(Duration::from_millis(300)).await);
    }

    let ids: Vec<String> = (0..8).map(|i| format!("server_{i}")).collect();
    let hosts = ids
        .iter()
        .zip(&servers)
        .map(|(id, server)| (id.as_str(), server.uri()))
        .collect();

    let backend = Arc::new(MemoryBackend::new());
    let collector = create_collector(hosts, backend.clone());

    let started = Instant::now();
    let outcome = collector.run_cycle().await;
    let elapsed = started.elapsed();

    // 8 hosts x 4 charts x 300ms sequentially would be close to 10s
    assert!(elapsed < Duration::from_secs(3), "cycle took {elapsed:?}");
    assert_matches!(outcome, CycleOutcome::Completed(report) if report.hosts == 8 && report.complete_records == 8);
    assert_eq!(backend.query_latest_per_host().await.unwrap().len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_cycles_are_skipped() {
    let server = slow_host(Duration::from_millis(500)).await;
    let backend = Arc::new(MemoryBackend::new());
    let collector = Arc::new(create_collector(vec![("server_1", server.uri())], backend.clone()));

    let running = tokio::spawn({
        let collector = collector.clone();
        async move { collector.run_cycle().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let concurrent: Vec<_> = futures::future::join_all((0..5).map(|_| collector.run_cycle())).await;
    assert!(concurrent.iter().all(|o| *o == CycleOutcome::Skipped));

    assert_matches!(running.await.unwrap(), CycleOutcome::Completed(report) if report.cycle == 1);
    assert_eq!(
        backend.get_stats().await.unwrap(),
        "In-Memory: 1 records across 1 hosts"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_cycles() {
    let servers = [healthy_host().await, healthy_host().await, healthy_host().await];
    let backend = Arc::new(MemoryBackend::new());
    let collector = Arc::new(create_collector(
        vec![
            ("server_1", servers[0].uri()),
            ("server_2", servers[1].uri()),
            ("server_3", servers[2].uri()),
        ],
        backend.clone(),
    ));

    let writer = tokio::spawn({
        let collector = collector.clone();
        async move {
            for _ in 0..5 {
                collector.run_cycle().await;
            }
        }
    });

    let service = QueryService::new(backend.clone());
    while !writer.is_finished() {
        let latest = service.latest().await.unwrap();
        // either nothing committed yet or every host of the cycle
        assert!(latest.is_empty() || latest.len() == 3);
        if let Some(first) = latest.values().next() {
            assert!(latest.values().all(|m| m.timestamp == first.timestamp));
        }
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    assert_eq!(
        backend.get_stats().await.unwrap(),
        "In-Memory: 15 records across 3 hosts"
    );
}

#[tokio::test]
async fn test_scheduler_runs_cycles_on_demand() {
    let server = healthy_host().await;
    let backend = Arc::new(MemoryBackend::new());
    let collector = Arc::new(create_collector(vec![("server_1", server.uri())], backend.clone()));

    let handle = SchedulerHandle::spawn(collector, Duration::from_secs(3600));

    // the first tick fires immediately, RunNow queues behind or races it
    let outcome = handle.run_now().await.unwrap();
    assert_matches!(outcome, CycleOutcome::Completed(report) if report.committed);

    handle.shutdown().await.unwrap();

    let stats = backend.get_stats().await.unwrap();
    assert!(
        stats == "In-Memory: 1 records across 1 hosts" || stats == "In-Memory: 2 records across 1 hosts",
        "unexpected stats: {stats}"
    );
}
