//! Scan cursor: pagination, range bounds, ordering, one-shot variant

mod common;

use common::{client_for, test_config, FakeCluster};
use quorumkv::QuorumClient;

fn seed_keys(cluster: &std::sync::Arc<FakeCluster>, count: usize) {
    for i in 0..count {
        cluster.store(&format!("key{i:03}"), &format!("value{i}"));
    }
}

#[tokio::test]
async fn cursor_walks_every_key_across_pages() {
    let cluster = FakeCluster::new(3);
    seed_keys(&cluster, 250);
    // keys outside the range must never surface
    cluster.store("0-before", "x");
    cluster.store("zz-after", "x");
    let client = client_for(&cluster);

    let mut result = client.scan("a", "z").await;
    let mut seen = Vec::new();
    while !result.done() {
        seen.push(result.key().unwrap().to_string());
        result.next().await;
    }

    assert!(result.error().is_none());
    assert_eq!(seen.len(), 250);
    assert_eq!(seen.first().unwrap(), "key000");
    assert_eq!(seen.last().unwrap(), "key249");
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);
    // done stays true once the range is consumed
    assert!(result.done());
    assert_eq!(result.key(), None);

    client.shutdown().await;
}

#[tokio::test]
async fn half_open_range_excludes_end_key() {
    let cluster = FakeCluster::new(3);
    cluster.store("a", "1");
    cluster.store("b", "2");
    cluster.store("c", "3");
    let client = client_for(&cluster);

    let mut result = client.scan("a", "c").await;
    let mut seen = Vec::new();
    while !result.done() {
        seen.push(result.key().unwrap().to_string());
        result.next().await;
    }
    assert_eq!(seen, vec!["a", "b"]);

    client.shutdown().await;
}

#[tokio::test]
async fn page_boundary_at_exact_batch_size() {
    let cluster = FakeCluster::new(3);
    // exactly two full pages
    seed_keys(&cluster, 200);
    let client = client_for(&cluster);

    let mut result = client.scan("a", "z").await;
    let mut count = 0;
    while !result.done() {
        count += 1;
        result.next().await;
    }
    assert_eq!(count, 200);

    client.shutdown().await;
}

#[tokio::test]
async fn empty_range_is_done_immediately() {
    let cluster = FakeCluster::new(3);
    let client = client_for(&cluster);

    let result = client.scan("a", "z").await;
    assert!(result.done());
    assert!(result.error().is_none());
    assert_eq!(result.key(), None);
    assert_eq!(result.value(), None);

    client.shutdown().await;
}

#[tokio::test]
async fn scan_once_empty_range_is_ok_not_error() {
    let cluster = FakeCluster::new(3);
    let client = client_for(&cluster);

    let entries = client.scan_once("k1", "k5").await.unwrap();
    assert!(entries.is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn scan_once_returns_at_most_one_page() {
    let cluster = FakeCluster::new(3);
    seed_keys(&cluster, 150);
    let client = client_for(&cluster);

    let entries = client.scan_once("a", "z").await.unwrap();
    assert_eq!(entries.len(), 100);
    assert_eq!(entries[0].key, "key000");

    client.shutdown().await;
}

#[tokio::test]
async fn cursor_records_error_when_cluster_dies_mid_scan() {
    let cluster = FakeCluster::new(3);
    seed_keys(&cluster, 250);
    let client = client_for(&cluster);

    let mut result = client.scan("a", "z").await;
    // consume the first page, then kill the cluster before the refill
    for _ in 0..100 {
        assert!(!result.done());
        result.next().await;
        if result.error().is_some() {
            break;
        }
    }
    cluster.take_down_all();
    while !result.done() {
        result.next().await;
    }
    assert!(result.error().is_some());
    assert_eq!(result.key(), None);

    client.shutdown().await;
}

#[tokio::test]
async fn cursor_outlives_nothing_it_needs() {
    // a cursor keeps the shared client state alive by refcount
    let cluster = FakeCluster::new(3);
    seed_keys(&cluster, 10);

    let mut result = {
        let client: QuorumClient =
            QuorumClient::with_gateway(test_config(cluster.members()), cluster.clone()).unwrap();
        let r = client.scan("a", "z").await;
        client.shutdown().await;
        r
    };

    let mut count = 0;
    while !result.done() {
        count += 1;
        result.next().await;
    }
    assert_eq!(count, 10);
}
