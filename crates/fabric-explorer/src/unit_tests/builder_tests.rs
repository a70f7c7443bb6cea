// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::error::{BranchKind, BranchScope};
use crate::telemetry::init_for_testing;
use crate::test_connection::{sample_network, LocalConnection, LocalNetwork, Query};

fn names<'a, T: std::fmt::Display + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<String> {
    items.map(|item| item.to_string()).collect()
}

#[tokio::test]
async fn builds_full_topology() {
    init_for_testing();
    let connection = LocalConnection::new(sample_network());
    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    assert!(!snapshot.has_errors());
    assert_eq!(names(snapshot.peers()), vec!["peerOne", "peerTwo"]);
    assert_eq!(names(snapshot.channels()), vec!["channelOne", "channelTwo"]);
    assert_eq!(
        names(
            snapshot
                .peers_of(&ChannelRef::from("channelTwo"))
                .unwrap()
                .iter()
        ),
        vec!["peerOne", "peerTwo"]
    );
    assert_eq!(
        names(
            snapshot
                .channels_of(&PeerRef::from("peerOne"))
                .unwrap()
                .iter()
        ),
        vec!["channelOne", "channelTwo"]
    );

    let installed: Vec<_> = snapshot
        .installed_chaincode()
        .map(|entry| format!("{} {} {}", entry.name, entry.version, entry.peer))
        .collect();
    assert_eq!(
        installed,
        vec![
            "sample-car-network 1.0 peerOne",
            "sample-car-network 1.2 peerOne",
            "sample-food-network 0.6 peerOne",
            "biscuit-network 0.7 peerTwo",
        ]
    );

    let instantiated: Vec<_> = snapshot
        .instantiated_chaincode()
        .map(|entry| format!("{}@{} {}", entry.name, entry.version, entry.channel))
        .collect();
    assert_eq!(
        instantiated,
        vec!["biscuit-network@0.7 channelOne", "cake-network@0.10 channelTwo"]
    );

    let organizations: Vec<_> = snapshot
        .distinct_organizations()
        .into_iter()
        .map(|org| org.to_string())
        .collect();
    assert_eq!(organizations, vec!["Org1", "Org2", "Org3"]);
}

#[tokio::test]
async fn peer_failure_stops_the_pass() {
    let connection = LocalConnection::new(sample_network());
    connection.fail(Query::Peers, "some error");

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    assert_eq!(snapshot.peers().count(), 0);
    assert_eq!(snapshot.channels().count(), 0);
    assert_eq!(snapshot.errors().len(), 1);
    let error = &snapshot.errors()[0];
    assert_eq!(error.kind, BranchKind::Peers);
    assert_eq!(error.scope, BranchScope::Network);
    assert_eq!(error.message, "Error populating nodes view: some error");
    assert_eq!(error.detail, "Error populating nodes view: Error: some error");
    assert_eq!(connection.calls(), vec![Query::Peers]);
}

#[tokio::test]
async fn channel_failure_is_scoped_to_its_peer() {
    let connection = LocalConnection::new(sample_network());
    connection.fail(Query::channels("peerTwo"), "some error");

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    let kinds: Vec<_> = snapshot.errors().iter().map(|error| error.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BranchKind::Channels,
            BranchKind::InstantiatedChaincode,
            BranchKind::Organizations,
        ]
    );
    assert!(snapshot
        .errors()
        .iter()
        .all(|error| error.scope == BranchScope::Peer(PeerRef::from("peerTwo"))));
    assert_eq!(
        snapshot.errors()[0].message,
        "Error populating channel view: Error creating channel map: some error"
    );

    // peerOne still contributes both channels, and peerTwo keeps its installed chaincode.
    assert_eq!(names(snapshot.channels()), vec!["channelOne", "channelTwo"]);
    assert_eq!(
        names(
            snapshot
                .peers_of(&ChannelRef::from("channelTwo"))
                .unwrap()
                .iter()
        ),
        vec!["peerOne"]
    );
    assert!(snapshot.channels_of(&PeerRef::from("peerTwo")).is_none());
    assert_eq!(
        snapshot
            .installed_on(&PeerRef::from("peerTwo"))
            .unwrap()
            .len(),
        1
    );
    assert_eq!(snapshot.instantiated_chaincode().count(), 2);
}

#[tokio::test]
async fn unavailable_transport_is_reported_as_connection_failure() {
    let connection = LocalConnection::new(sample_network());
    connection.fail(
        Query::channels("peerOne"),
        "Received http2 header with status: 503",
    );

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    let index = snapshot
        .error_indices(BranchKind::InstantiatedChaincode)
        .next()
        .unwrap();
    assert_eq!(
        snapshot.errors()[index].message,
        "Error populating instantiated smart contracts view: Cannot connect to Fabric: Received http2 header with status: 503"
    );

    // A status code alone is enough.
    let connection = LocalConnection::new(sample_network());
    connection.fail(
        Query::channels("peerOne"),
        TransportError::new("unavailable").with_status(14),
    );
    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;
    assert_eq!(
        snapshot.errors()[0].message,
        "Error populating channel view: Cannot connect to Fabric: unavailable"
    );
}

#[tokio::test]
async fn installed_failure_is_isolated() {
    let connection = LocalConnection::new(sample_network());
    connection.fail(Query::installed("peerOne"), "some error");

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    assert_eq!(snapshot.errors().len(), 1);
    let error = &snapshot.errors()[0];
    assert_eq!(error.kind, BranchKind::InstalledChaincode);
    assert_eq!(
        error.message,
        "Error populating installed smart contracts view: some error"
    );
    assert_eq!(error.message, error.detail);
    assert!(snapshot.installed_on(&PeerRef::from("peerOne")).is_none());
    let installed: Vec<_> = snapshot
        .installed_chaincode()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(installed, vec!["biscuit-network"]);
    assert_eq!(names(snapshot.channels()), vec!["channelOne", "channelTwo"]);
}

#[tokio::test]
async fn channel_level_failures_are_isolated() {
    let connection = LocalConnection::new(sample_network());
    connection.fail(Query::instantiated("channelOne"), "some error");
    connection.fail(
        Query::organizations("channelTwo"),
        TransportError::named("an error with no message"),
    );

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    let messages: Vec<_> = snapshot
        .errors()
        .iter()
        .map(|error| (error.kind, error.message.as_str()))
        .collect();
    assert_eq!(
        messages,
        vec![
            (
                BranchKind::InstantiatedChaincode,
                "Error populating instantiated smart contracts view: some error"
            ),
            (
                BranchKind::Organizations,
                "Error populating organizations view: an error with no message"
            ),
        ]
    );
    assert_eq!(
        snapshot.errors()[1].detail,
        "Error populating organizations view: Error: an error with no message"
    );

    let instantiated: Vec<_> = snapshot
        .instantiated_chaincode()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(instantiated, vec!["cake-network"]);
    let organizations: Vec<_> = snapshot
        .distinct_organizations()
        .into_iter()
        .map(|org| org.to_string())
        .collect();
    assert_eq!(organizations, vec!["Org1", "Org2"]);
}

#[tokio::test]
async fn malformed_responses_become_branch_errors() {
    let network = LocalNetwork::default()
        .with_peer("peerOne", &["channelOne", ""])
        .with_peer("peerTwo", &["channelOne"])
        .with_installed("peerTwo", "biscuit-network", &[""]);
    let connection = LocalConnection::new(network);

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    let kinds: Vec<_> = snapshot
        .errors()
        .iter()
        .map(|error| (error.kind, error.scope.clone()))
        .collect();
    let peer_one = BranchScope::Peer(PeerRef::from("peerOne"));
    let peer_two = BranchScope::Peer(PeerRef::from("peerTwo"));
    assert_eq!(
        kinds,
        vec![
            (BranchKind::Channels, peer_one.clone()),
            (BranchKind::InstantiatedChaincode, peer_one.clone()),
            (BranchKind::Organizations, peer_one),
            (BranchKind::InstalledChaincode, peer_two),
        ]
    );
    assert_eq!(names(snapshot.channels()), vec!["channelOne"]);
}

#[tokio::test]
async fn duplicates_within_a_key_are_dropped() {
    let network = LocalNetwork::default()
        .with_peer("peerOne", &["channelOne", "channelOne"])
        .with_installed("peerOne", "biscuit-network", &["0.7", "0.7"])
        .with_organizations("channelOne", &["Org1", "Org1"]);
    let connection = LocalConnection::new(network);

    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    assert!(!snapshot.has_errors());
    assert_eq!(names(snapshot.channels()), vec!["channelOne"]);
    assert_eq!(snapshot.installed_chaincode().count(), 1);
    assert_eq!(
        snapshot
            .organizations_of(&ChannelRef::from("channelOne"))
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn merge_order_ignores_completion_order() {
    let fast = LocalConnection::new(sample_network());
    let slow = LocalConnection::new(sample_network());
    slow.delay(Query::channels("peerOne"), Duration::from_secs(5));
    slow.delay(Query::instantiated("channelOne"), Duration::from_secs(5));

    let builder = TopologySnapshotBuilder::default();
    let (expected, actual) = tokio::join!(builder.build(&fast), builder.build(&slow));
    assert_eq!(expected, actual);

    // Serial queries give the same answer.
    let serial = TopologySnapshotBuilder::default()
        .max_concurrent_queries(1)
        .build(&slow)
        .await;
    assert_eq!(expected, serial);
}

#[tokio::test(start_paused = true)]
async fn channel_queries_do_not_wait_for_installed_chaincode() {
    let expected = TopologySnapshotBuilder::default()
        .build(&LocalConnection::new(sample_network()))
        .await;

    let connection = LocalConnection::new(sample_network());
    connection.delay(Query::installed("peerOne"), Duration::from_secs(10));
    connection.delay(Query::instantiated("channelOne"), Duration::from_secs(10));

    let start = tokio::time::Instant::now();
    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(15), "took {elapsed:?}");
    assert_eq!(snapshot, expected);
}

#[tokio::test]
async fn empty_network_has_no_errors() {
    let connection = LocalConnection::new(LocalNetwork::default());
    let snapshot = TopologySnapshotBuilder::default().build(&connection).await;
    assert_eq!(snapshot, TopologySnapshot::empty());
}

#[test]
fn concurrency_is_at_least_one() {
    let builder = TopologySnapshotBuilder::default().max_concurrent_queries(0);
    assert_eq!(builder.max_concurrent_queries, 1);
}

#[tokio::test]
async fn branch_errors_are_counted() {
    let metrics = Arc::new(ExplorerMetrics::new_for_tests());
    let connection = LocalConnection::new(sample_network());
    connection.fail(Query::channels("peerOne"), "some error");
    connection.fail(Query::installed("peerTwo"), "some error");

    TopologySnapshotBuilder::default()
        .metrics(metrics.clone())
        .build(&connection)
        .await;

    let count = |branch: &str| metrics.branch_errors.with_label_values(&[branch]).get();
    assert_eq!(count("channels"), 1);
    assert_eq!(count("instantiated_chaincode"), 1);
    assert_eq!(count("organizations"), 1);
    assert_eq!(count("installed_chaincode"), 1);
    assert_eq!(count("peers"), 0);
    assert_eq!(metrics.aggregation_latency.get_sample_count(), 1);
}
