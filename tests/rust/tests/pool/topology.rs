//! Cluster auto-detection through the pool

use std::sync::Arc;

use pretty_assertions::assert_eq;
use redis_mcp_core::ClusterMode;
use redis_mcp_gateway::{DbSlot, TopologyDetector};
use tests::fixtures::{descriptor, fake_pool};
use tests::{ClusterReply, FakeConnector};

#[tokio::test]
async fn test_detected_cluster_drops_database() {
    let (pool, connector) = fake_pool(FakeConnector::new().with_cluster(ClusterReply::Enabled));
    let mut target = descriptor("10.0.0.1", 7000);
    target.db = Some(4);

    let message = pool.add("cluster", target).await.unwrap();

    assert_eq!(
        message,
        "Successfully connected to Redis at 10.0.0.1:7000 (cluster mode)"
    );
    let rows = pool.list().await;
    assert!(rows["cluster"].cluster_mode);
    assert_eq!(rows["cluster"].db, DbSlot::NotApplicable("N/A (cluster)"));

    let clustered: Vec<bool> = connector.requests().iter().map(|r| r.clustered).collect();
    assert_eq!(clustered, vec![false, true, true]);
    assert!(connector
        .requests()
        .iter()
        .skip(1)
        .all(|r| r.descriptor.db.is_none()));
}

#[tokio::test]
async fn test_probe_connection_is_closed() {
    let (pool, connector) = fake_pool(FakeConnector::new().with_cluster(ClusterReply::Enabled));

    pool.add("cluster", descriptor("10.0.0.1", 7000)).await.unwrap();

    let probe = connector.channel(1).unwrap();
    assert!(probe.is_closed());
    assert_eq!(probe.commands(), vec![vec!["INFO".to_string(), "cluster".to_string()]]);
    assert_eq!(connector.live_channels(), 2);
}

#[tokio::test]
async fn test_cluster_disabled_is_standalone() {
    let (pool, _connector) = fake_pool(FakeConnector::new().with_cluster(ClusterReply::Disabled));
    let mut target = descriptor("10.0.0.1", 6379);
    target.db = Some(2);

    let message = pool.add("single", target).await.unwrap();

    assert_eq!(message, "Successfully connected to Redis at 10.0.0.1:6379");
    let rows = pool.list().await;
    assert!(!rows["single"].cluster_mode);
    assert_eq!(rows["single"].db, DbSlot::Index(2));
}

#[tokio::test]
async fn test_cluster_support_disabled_error_is_standalone() {
    let (pool, connector) =
        fake_pool(FakeConnector::new().with_cluster(ClusterReply::SupportDisabled));

    pool.add("single", descriptor("10.0.0.1", 6379)).await.unwrap();

    let rows = pool.list().await;
    assert!(!rows["single"].cluster_mode);
    assert_eq!(rows["single"].db, DbSlot::Index(0));
    assert!(connector.requests().iter().all(|r| !r.clustered));
}

#[tokio::test]
async fn test_explicit_cluster_mode_skips_probe() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    let target = descriptor("10.0.0.1", 7000).with_cluster_mode(ClusterMode::Clustered);

    pool.add("cluster", target).await.unwrap();

    assert_eq!(connector.opened(), 2);
    assert!(connector.requests().iter().all(|r| r.clustered));
}

#[tokio::test]
async fn test_unreachable_probe_is_standalone() {
    let connector = Arc::new(FakeConnector::new().with_cluster(ClusterReply::Enabled));
    connector.set_refusing(true);

    let detected = TopologyDetector::new(connector.clone())
        .detect(&descriptor("10.0.0.1", 6379), None)
        .await;

    assert!(!detected);
    assert_eq!(connector.opened(), 0);
}
