//! End-to-end store tests against the in-memory transport: cross-spork range
//! splitting, batch-size consistency, deep fan-out reassembly and directory
//! refresh behavior.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use spork_core::{Error, Identifier, Spork, SporkList, StoreConfig};
use spork_store::testing::{MockAccessNode, MockConnector};
use spork_store::{EventReader, SporkStore};

const DEPOSIT: &str = "A.0x1.Token.Deposited";

// Feed URL pointing nowhere; tests that exercise refresh expect it to fail.
const DEAD_FEED_URL: &str = "http://127.0.0.1:9/sporks.json";

fn ident(tag: u8, height: u64) -> Identifier {
    let mut bytes = [tag; 32];
    bytes[24..].copy_from_slice(&height.to_be_bytes());
    Identifier::new(bytes)
}

/// One block per height, each with a single collection holding one
/// transaction that emits two events (registered in reverse index order to
/// exercise the final sort). The typed endpoint serves one event per height.
fn populate(node: &MockAccessNode, heights: RangeInclusive<u64>) {
    for height in heights {
        let collection = ident(0xcc, height);
        let tx = ident(0xaa, height);
        node.add_block(height, ident(0xbb, height), height * 10, &[collection]);
        node.add_collection(collection, &[tx]);
        node.add_transaction_result(
            tx,
            vec![
                MockAccessNode::event(DEPOSIT, tx, 0, 1),
                MockAccessNode::event(DEPOSIT, tx, 0, 0),
            ],
            None,
        );
        node.add_typed_event(height, DEPOSIT, 0, 0);
    }
}

/// Adds a second, failed transaction to the collection at `height`.
fn add_error_transaction(node: &MockAccessNode, height: u64) -> Identifier {
    let failed = ident(0xee, height);
    node.add_collection(ident(0xcc, height), &[ident(0xaa, height), failed]);
    node.add_transaction_result(failed, vec![], Some("execution failed: assertion".into()));
    failed
}

fn fixture() -> (MockConnector, MockAccessNode, MockAccessNode) {
    let connector = MockConnector::new();
    let node_a = MockAccessNode::new();
    populate(&node_a, 990..=999);
    let node_b = MockAccessNode::new();
    populate(&node_b, 1000..=1010);
    connector.register("node-a:9000", node_a.clone());
    connector.register("node-b:9000", node_b.clone());
    (connector, node_a, node_b)
}

fn spork_list() -> SporkList {
    SporkList::new(vec![
        Spork {
            id: 1.0,
            name: "spork-1".into(),
            root_height: 0,
            access_node: "node-a:9000".into(),
        },
        Spork {
            id: 2.0,
            name: "spork-2".into(),
            root_height: 1000,
            access_node: "node-b:9000".into(),
        },
    ])
}

fn store(connector: &MockConnector, batch_size: u64) -> SporkStore {
    SporkStore::with_spork_list(
        StoreConfig::new("mainnet")
            .with_network_config_url(DEAD_FEED_URL)
            .with_query_batch_size(batch_size),
        connector.clone().into_arc(),
        spork_list(),
    )
}

#[tokio::test]
async fn test_cross_spork_typed_query_splits_across_nodes() {
    let (connector, node_a, node_b) = fixture();
    let store = store(&connector, 200);

    let events = store
        .query_event_by_block_range(DEPOSIT, 990, 1010)
        .await
        .unwrap();

    let heights: Vec<_> = events.iter().map(|b| b.height).collect();
    assert_eq!(heights, (990..=1010).collect::<Vec<_>>());

    // Each node saw exactly its own spork's sub-range.
    assert_eq!(node_a.recorded_ranges(), vec![(990, 999)]);
    assert_eq!(node_b.recorded_ranges(), vec![(1000, 1010)]);
}

#[tokio::test]
async fn test_typed_query_batch_size_consistency() {
    let (connector, _node_a, _node_b) = fixture();
    let batch_1 = store(&connector, 1);
    let batch_200 = store(&connector, 200);

    let from_batch_1 = batch_1
        .query_event_by_block_range(DEPOSIT, 990, 1010)
        .await
        .unwrap();
    let from_batch_200 = batch_200
        .query_event_by_block_range(DEPOSIT, 990, 1010)
        .await
        .unwrap();

    assert_eq!(from_batch_1, from_batch_200);
}

#[tokio::test]
async fn test_all_events_cross_spork_sorted_with_error_transactions() {
    let (connector, node_a, _node_b) = fixture();
    let failed = add_error_transaction(&node_a, 995);
    let store = store(&connector, 200);

    let (blocks, error_transactions) = store
        .query_all_event_by_block_range(990, 1010)
        .await
        .unwrap();

    assert_eq!(blocks.len(), 21);
    let heights: Vec<_> = blocks.iter().map(|b| b.height).collect();
    assert_eq!(heights, (990..=1010).collect::<Vec<_>>());

    for block in &blocks {
        assert_eq!(block.events.len(), 2);
        let order: Vec<_> = block
            .events
            .iter()
            .map(|e| (e.transaction_index, e.event_index))
            .collect();
        assert_eq!(order, vec![(0, 0), (0, 1)]);
    }

    // The failed transaction contributed no events but is reported.
    assert_eq!(error_transactions.len(), 1);
    assert_eq!(error_transactions[0].transaction_id, failed);
    assert_eq!(error_transactions[0].error, "execution failed: assertion");
}

#[tokio::test]
async fn test_all_events_batch_size_consistency() {
    let (connector, node_a, _node_b) = fixture();
    add_error_transaction(&node_a, 992);
    let batch_1 = store(&connector, 1);
    let batch_200 = store(&connector, 200);

    let from_batch_1 = batch_1
        .query_all_event_by_block_range(990, 1010)
        .await
        .unwrap();
    let from_batch_200 = batch_200
        .query_all_event_by_block_range(990, 1010)
        .await
        .unwrap();

    assert_eq!(from_batch_1.0, from_batch_200.0);
    assert_eq!(from_batch_1.1, from_batch_200.1);
}

#[tokio::test]
async fn test_fanout_rpc_failure_aborts_whole_query() {
    let (connector, _node_a, node_b) = fixture();
    node_b.fail_transaction(ident(0xaa, 1005));
    let store = store(&connector, 200);

    assert!(store
        .query_all_event_by_block_range(1000, 1010)
        .await
        .is_err());

    // The typed path does not touch transaction results and still works.
    assert!(store
        .query_event_by_block_range(DEPOSIT, 1000, 1010)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_latest_height_comes_from_latest_spork_only() {
    let (connector, _node_a, _node_b) = fixture();
    let store = store(&connector, 200);

    assert_eq!(store.query_latest_block_height().await.unwrap(), 1010);
    assert_eq!(connector.dial_count("node-b:9000"), 1);
    assert_eq!(connector.dial_count("node-a:9000"), 0);
}

#[tokio::test]
async fn test_range_validation_through_store() {
    let (connector, _node_a, _node_b) = fixture();
    let store = SporkStore::with_spork_list(
        StoreConfig::new("mainnet")
            .with_network_config_url(DEAD_FEED_URL)
            .with_max_query_blocks(10),
        connector.clone().into_arc(),
        spork_list(),
    );

    assert!(matches!(
        store.query_event_by_block_range(DEPOSIT, 0, 11).await,
        Err(Error::RangeTooLarge { .. })
    ));

    let before_earliest = SporkStore::with_spork_list(
        StoreConfig::new("mainnet").with_network_config_url(DEAD_FEED_URL),
        connector.clone().into_arc(),
        SporkList::new(vec![Spork {
            id: 1.0,
            name: "spork-1".into(),
            root_height: 100,
            access_node: "node-a:9000".into(),
        }]),
    );
    assert!(matches!(
        before_earliest.query_event_by_block_range(DEPOSIT, 50, 60).await,
        Err(Error::HeightBeforeEarliestSpork(50))
    ));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let (connector, _node_a, _node_b) = fixture();
    let store = Arc::new(SporkStore::with_spork_list(
        StoreConfig::new("mainnet")
            .with_network_config_url(DEAD_FEED_URL)
            .with_refresh_interval(Duration::from_millis(10)),
        connector.clone().into_arc(),
        spork_list(),
    ));

    // Operator-triggered resync surfaces the feed error...
    assert!(matches!(
        store.sync_sporks().await,
        Err(Error::DirectoryFetch(_))
    ));

    // ...while the background refresh logs it and keeps the old snapshot.
    let refresh = store.spawn_refresh_task();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!refresh.is_finished());
    refresh.abort();

    assert!(store.describe().contains("sporks: 2"));
    assert!(store
        .query_event_by_block_range(DEPOSIT, 990, 1010)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_close_releases_connections() {
    let (connector, node_a, node_b) = fixture();
    let store = store(&connector, 200);

    store
        .query_event_by_block_range(DEPOSIT, 990, 1010)
        .await
        .unwrap();
    store.close().await;

    assert_eq!(node_a.close_count() + node_b.close_count(), 2);
}
