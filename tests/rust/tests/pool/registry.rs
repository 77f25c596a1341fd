//! Registry semantics: one entry per host identifier, a default that always
//! points at a live entry, handles that are never shared across entries.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use redis_mcp_gateway::{
    CommandChannel, ConnectionDescription, DbSlot, FailureCategory, PoolError, ReplyMode,
};
use tests::fixtures::{descriptor, fake_pool, standalone_descriptor};
use tests::{ClusterReply, FakeConnector, FAKE_REDIS_VERSION};

// ============================================================================
// add / get
// ============================================================================

#[tokio::test]
async fn test_first_added_host_becomes_default() {
    let (pool, _connector) = fake_pool(FakeConnector::new());

    let message = pool
        .add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    pool.add("replica", standalone_descriptor("10.0.0.2", 6379))
        .await
        .unwrap();

    assert_eq!(message, "Successfully connected to Redis at 10.0.0.1:6379");
    assert_eq!(pool.default_host().as_deref(), Some("primary"));
    assert_eq!(pool.host_ids(), vec!["primary", "replica"]);
}

#[tokio::test]
async fn test_decoded_and_raw_handles_are_distinct() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();

    let decoded = pool.get(Some("primary"), ReplyMode::Decoded).unwrap();
    let raw = pool.get(Some("primary"), ReplyMode::Raw).unwrap();

    assert!(!Arc::ptr_eq(&decoded, &raw));
    assert!(!Arc::ptr_eq(decoded.channel(), raw.channel()));
    assert_eq!(decoded.mode(), ReplyMode::Decoded);
    assert_eq!(raw.mode(), ReplyMode::Raw);
    assert_eq!(connector.opened(), 2);
}

#[tokio::test]
async fn test_get_default_resolves_to_default_host() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();

    let handle = pool.get(None, ReplyMode::Decoded).unwrap();

    assert_eq!(handle.host_id(), "primary");
}

#[tokio::test]
async fn test_get_on_empty_pool() {
    let (pool, _connector) = fake_pool(FakeConnector::new());

    let err = pool.get(None, ReplyMode::Decoded).unwrap_err();

    assert!(matches!(err, PoolError::NoConnections));
}

#[tokio::test]
async fn test_get_unknown_host_lists_available() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();

    match pool.get(Some("ghost"), ReplyMode::Raw) {
        Err(PoolError::NotFound { host_id, available }) => {
            assert_eq!(host_id, "ghost");
            assert_eq!(available, vec!["primary".to_string()]);
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

// ============================================================================
// Replacement and failure
// ============================================================================

#[tokio::test]
async fn test_replacing_entry_never_reuses_handles() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    let old_decoded = pool.get(Some("primary"), ReplyMode::Decoded).unwrap();
    let old_raw = pool.get(Some("primary"), ReplyMode::Raw).unwrap();

    pool.add("primary", standalone_descriptor("10.0.0.1", 6380))
        .await
        .unwrap();
    let new_decoded = pool.get(Some("primary"), ReplyMode::Decoded).unwrap();

    assert!(!Arc::ptr_eq(&old_decoded, &new_decoded));
    assert!(old_decoded.is_closed());
    assert!(old_raw.is_closed());
    assert!(!new_decoded.is_closed());
    assert_eq!(connector.opened(), 4);
    assert_eq!(connector.live_channels(), 2);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_replacement_takes_new_topology() {
    let (pool, connector) = fake_pool(FakeConnector::new().with_cluster(ClusterReply::Enabled));
    pool.add("a", descriptor("10.0.0.1", 7000)).await.unwrap();
    let rows = pool.list().await;
    assert!(rows["a"].cluster_mode);
    assert_eq!(rows["a"].db, DbSlot::NotApplicable("N/A (cluster)"));
    let old_decoded = pool.get(Some("a"), ReplyMode::Decoded).unwrap();
    let old_raw = pool.get(Some("a"), ReplyMode::Raw).unwrap();

    let mut standalone = standalone_descriptor("10.0.0.1", 6379);
    standalone.db = Some(2);
    let message = pool.add("a", standalone).await.unwrap();

    assert_eq!(message, "Successfully connected to Redis at 10.0.0.1:6379");
    let rows = pool.list().await;
    assert!(!rows["a"].cluster_mode);
    assert_eq!(rows["a"].db, DbSlot::Index(2));

    let new_decoded = pool.get(Some("a"), ReplyMode::Decoded).unwrap();
    let new_raw = pool.get(Some("a"), ReplyMode::Raw).unwrap();
    assert!(!Arc::ptr_eq(&old_decoded, &new_decoded));
    assert!(!Arc::ptr_eq(&old_raw, &new_raw));
    assert!(old_decoded.is_closed() && old_raw.is_closed());

    // probe + two clustered channels, then two standalone channels
    let clustered: Vec<bool> = connector.requests().iter().map(|r| r.clustered).collect();
    assert_eq!(clustered, vec![false, true, true, false, false]);
    assert_eq!(connector.live_channels(), 2);
}

#[tokio::test]
async fn test_failed_open_releases_partial_handles() {
    let (pool, connector) = fake_pool(FakeConnector::new().with_open_limit(1));

    let err = pool
        .add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap_err();

    match err {
        PoolError::Connectivity { category, .. } => {
            assert_eq!(category, FailureCategory::ConnectionRefused)
        }
        other => panic!("expected Connectivity, got {:?}", other),
    }
    assert!(connector.channel(1).unwrap().is_closed());
    assert_eq!(connector.live_channels(), 0);
    assert!(pool.is_empty());
    assert!(matches!(
        pool.get(None, ReplyMode::Decoded),
        Err(PoolError::NoConnections)
    ));
}

#[tokio::test]
async fn test_failed_liveness_check_rejects_add() {
    let (pool, connector) = fake_pool(FakeConnector::new().with_failing_ping(2));

    let err = pool
        .add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap_err();

    match err {
        PoolError::Connectivity { category, .. } => {
            assert_eq!(category, FailureCategory::AuthenticationFailed)
        }
        other => panic!("expected Connectivity, got {:?}", other),
    }
    assert_eq!(connector.opened(), 2);
    assert_eq!(connector.live_channels(), 0);
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_failed_replacement_keeps_existing_entry() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    let before = pool.get(Some("primary"), ReplyMode::Decoded).unwrap();

    connector.set_refusing(true);
    assert!(pool
        .add("primary", standalone_descriptor("10.0.0.9", 6379))
        .await
        .is_err());

    let after = pool.get(Some("primary"), ReplyMode::Decoded).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(!after.is_closed());
    assert_eq!(pool.default_host().as_deref(), Some("primary"));
}

// ============================================================================
// remove / switch default
// ============================================================================

#[tokio::test]
async fn test_remove_unknown_host_is_not_an_error() {
    let (pool, _connector) = fake_pool(FakeConnector::new());

    let message = pool.remove("ghost").await;

    assert_eq!(message, "Connection 'ghost' not found in pool");
}

#[tokio::test]
async fn test_remove_closes_handles_and_evicts() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    pool.add("replica", standalone_descriptor("10.0.0.2", 6379))
        .await
        .unwrap();
    let handle = pool.get(Some("primary"), ReplyMode::Raw).unwrap();

    let message = pool.remove("primary").await;

    assert_eq!(message, "Successfully disconnected from 'primary'");
    assert!(handle.is_closed());
    assert_eq!(connector.live_channels(), 2);
    assert!(matches!(
        pool.get(Some("primary"), ReplyMode::Decoded),
        Err(PoolError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_removing_default_reassigns_it() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    pool.add("replica", standalone_descriptor("10.0.0.2", 6379))
        .await
        .unwrap();

    pool.remove("primary").await;
    assert_eq!(pool.default_host().as_deref(), Some("replica"));
    assert_eq!(pool.get(None, ReplyMode::Decoded).unwrap().host_id(), "replica");

    pool.remove("replica").await;
    assert_eq!(pool.default_host(), None);
    assert!(matches!(
        pool.get(None, ReplyMode::Decoded),
        Err(PoolError::NoConnections)
    ));
}

#[tokio::test]
async fn test_switch_default() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    pool.add("replica", standalone_descriptor("10.0.0.2", 6379))
        .await
        .unwrap();

    assert_eq!(
        pool.switch_default("replica"),
        "Default connection switched to 'replica'"
    );
    assert_eq!(pool.get(None, ReplyMode::Raw).unwrap().host_id(), "replica");

    assert_eq!(
        pool.switch_default("ghost"),
        r#"Connection 'ghost' not found. Available connections: ["primary", "replica"]"#
    );
    assert_eq!(pool.default_host().as_deref(), Some("replica"));
}

// ============================================================================
// list / describe
// ============================================================================

#[tokio::test]
async fn test_list_reports_live_details() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    let mut descriptor = standalone_descriptor("10.0.0.1", 6379);
    descriptor.db = Some(3);
    pool.add("primary", descriptor).await.unwrap();
    pool.add("replica", standalone_descriptor("10.0.0.2", 6379))
        .await
        .unwrap();

    let rows = pool.list().await;
    let primary = &rows["primary"];

    assert_eq!(rows.len(), 2);
    assert_eq!(primary.status, "connected");
    assert_eq!(primary.redis_version, FAKE_REDIS_VERSION);
    assert_eq!(primary.db, DbSlot::Index(3));
    assert!(!primary.cluster_mode);
    assert!(primary.is_default);
    assert!(!rows["replica"].is_default);
    assert_eq!(
        primary.connection_types,
        vec![ReplyMode::Decoded, ReplyMode::Raw]
    );
}

#[tokio::test]
async fn test_list_is_repeatable() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();

    let first = pool.list().await;
    let second = pool.list().await;

    assert_eq!(first, second);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_list_reports_dead_handle_as_error() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    pool.get(Some("primary"), ReplyMode::Decoded)
        .unwrap()
        .channel()
        .close()
        .await
        .unwrap();

    let rows = pool.list().await;

    assert!(rows["primary"].status.starts_with("error: "));
    assert_eq!(rows["primary"].redis_version, "unknown");
}

#[tokio::test]
async fn test_describe_without_default() {
    let (pool, _connector) = fake_pool(FakeConnector::new());

    assert_eq!(
        pool.describe(None).await,
        ConnectionDescription::Missing {
            error: PoolError::NoConnections.to_string()
        }
    );
}

#[tokio::test]
async fn test_describe_known_and_unknown_hosts() {
    let (pool, _connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();

    match pool.describe(None).await {
        ConnectionDescription::Found(details) => {
            assert_eq!(details.host_id, "primary");
            assert_eq!(details.host, "10.0.0.1");
            assert!(details.is_default);
        }
        other => panic!("expected details, got {:?}", other),
    }

    match pool.describe(Some("ghost")).await {
        ConnectionDescription::Missing { error } => {
            assert!(error.contains("'ghost' not found"));
            assert!(error.contains("primary"));
        }
        other => panic!("expected error payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_all_releases_everything() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    pool.add("primary", standalone_descriptor("10.0.0.1", 6379))
        .await
        .unwrap();
    pool.add("replica", standalone_descriptor("10.0.0.2", 6379))
        .await
        .unwrap();

    pool.close_all().await;

    assert!(pool.is_empty());
    assert_eq!(pool.default_host(), None);
    assert_eq!(connector.live_channels(), 0);
}

// ============================================================================
// Concurrent mutation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations_keep_registry_consistent() {
    let (pool, connector) = fake_pool(FakeConnector::new());
    let hosts = ["h1", "h2", "h3", "h4"];

    let mut tasks = Vec::new();
    for i in 0..200usize {
        let pool = pool.clone();
        let host = hosts[i % hosts.len()];
        tasks.push(tokio::spawn(async move {
            match i % 3 {
                0 => {
                    pool.add(host, standalone_descriptor("10.0.0.1", 6379))
                        .await
                        .unwrap();
                }
                1 => {
                    pool.remove(host).await;
                }
                _ => {
                    pool.switch_default(host);
                }
            }
            // Reads interleave with the mutations
            let _ = pool.get(None, ReplyMode::Decoded);
            pool.list().await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let ids = pool.host_ids();
    match pool.default_host() {
        Some(default) => assert!(ids.contains(&default)),
        None => assert!(ids.is_empty()),
    }
    assert_eq!(connector.live_channels(), 2 * ids.len());
    for id in &ids {
        for mode in ReplyMode::ALL {
            let handle = pool.get(Some(id), mode).unwrap();
            assert!(!handle.is_closed());
            assert_eq!(handle.mode(), mode);
        }
    }
}
