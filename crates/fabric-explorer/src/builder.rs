// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use tap::TapFallible;
use tracing::{debug, debug_span, warn, Instrument};

use crate::config::ExplorerConfig;
use crate::connection::{
    ChaincodeRef, ChannelRef, ConnectionHandle, InstalledChaincodeMap, OrganizationRef, PeerRef,
};
use crate::error::{BranchError, FaultClassifier, StatusPatternClassifier, TransportError};
use crate::metrics::ExplorerMetrics;
use crate::snapshot::{InstalledChaincodeEntry, InstantiatedChaincodeEntry, TopologySnapshot};

type ChannelListing = (PeerRef, Result<IndexSet<ChannelRef>, TransportError>);
type InstalledListing = (PeerRef, Result<Vec<InstalledChaincodeEntry>, TransportError>);
type ChannelContents = (
    ChannelRef,
    Result<Vec<InstantiatedChaincodeEntry>, TransportError>,
    Result<Vec<OrganizationRef>, TransportError>,
);

/// Queries a network and assembles a [`TopologySnapshot`].
///
/// Peers are listed first. Installed chaincode is then queried for every peer, while in parallel
/// the channels of every peer are listed, followed by instantiated chaincode and organizations for
/// every channel found. Only the channel queries wait on anything besides the peer list. Results
/// are merged in peer order and channel discovery order, never in completion order, so two passes
/// over the same network produce the same snapshot.
pub struct TopologySnapshotBuilder {
    classifier: Arc<dyn FaultClassifier>,
    max_concurrent_queries: usize,
    metrics: Option<Arc<ExplorerMetrics>>,
}

impl Default for TopologySnapshotBuilder {
    fn default() -> Self {
        Self::from_config(&ExplorerConfig::default())
    }
}

impl TopologySnapshotBuilder {
    pub fn new(classifier: Arc<dyn FaultClassifier>) -> Self {
        Self {
            classifier,
            max_concurrent_queries: ExplorerConfig::default().max_concurrent_queries,
            metrics: None,
        }
    }

    pub fn from_config(config: &ExplorerConfig) -> Self {
        let classifier: Arc<StatusPatternClassifier> = Arc::new(config.fault_classifier());
        Self::new(classifier).max_concurrent_queries(config.max_concurrent_queries)
    }

    /// Bound the number of queries of one kind in flight at once. Values below one are raised to one.
    pub fn max_concurrent_queries(mut self, max_concurrent_queries: usize) -> Self {
        self.max_concurrent_queries = max_concurrent_queries.max(1);
        self
    }

    pub fn metrics(mut self, metrics: Arc<ExplorerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build a snapshot of the network behind `connection`. Never fails: every failure ends up as
    /// a [`BranchError`] inside the returned snapshot.
    pub async fn build<C>(&self, connection: &C) -> TopologySnapshot
    where
        C: ConnectionHandle + ?Sized,
    {
        let _timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.aggregation_latency.start_timer());
        let mut snapshot = TopologySnapshot::empty();

        let peers = match connection
            .list_peers()
            .instrument(debug_span!("list_peers"))
            .await
            .and_then(validate_peers)
        {
            Ok(peers) => peers,
            Err(fault) => {
                // Nothing else can be queried without peer names.
                warn!(?fault, "Failed to list peers");
                self.record(&mut snapshot, BranchError::peers(&fault));
                return snapshot;
            }
        };
        let peer_count = peers.len();

        let (installed, (channels, contents)) = futures::join!(
            self.list_installed(connection, &peers)
                .instrument(debug_span!("installed_queries", peers = peer_count)),
            async {
                let channels = self
                    .list_channels(connection, &peers)
                    .instrument(debug_span!("channel_queries", peers = peer_count))
                    .await;
                let discovered = discovered_channels(&channels);
                let contents = self
                    .list_channel_contents(connection, &discovered)
                    .instrument(debug_span!("channel_content_queries", channels = discovered.len()))
                    .await;
                (channels, contents)
            }
        );

        snapshot.peers = peers;
        for ((peer, channels), (_, installed)) in channels.into_iter().zip(installed) {
            self.merge_channels(&mut snapshot, &peer, channels);
            self.merge_installed(&mut snapshot, peer, installed);
        }
        for contents in contents {
            self.merge_channel_contents(&mut snapshot, contents);
        }

        debug!(
            peers = snapshot.peers.len(),
            channels = snapshot.channel_peers.len(),
            errors = snapshot.errors.len(),
            "Built topology snapshot"
        );
        snapshot
    }

    async fn list_installed<C>(
        &self,
        connection: &C,
        peers: &IndexSet<PeerRef>,
    ) -> Vec<InstalledListing>
    where
        C: ConnectionHandle + ?Sized,
    {
        stream::iter(peers.iter().cloned())
            .map(|peer| async move {
                let installed = connection
                    .list_installed_chaincode(&peer)
                    .await
                    .and_then(|installed| installed_entries(&peer, installed));
                (peer, installed)
            })
            .buffered(self.max_concurrent_queries)
            .collect()
            .await
    }

    async fn list_channels<C>(
        &self,
        connection: &C,
        peers: &IndexSet<PeerRef>,
    ) -> Vec<ChannelListing>
    where
        C: ConnectionHandle + ?Sized,
    {
        stream::iter(peers.iter().cloned())
            .map(|peer| async move {
                let channels = connection
                    .list_channels(&peer)
                    .await
                    .and_then(validate_channels);
                (peer, channels)
            })
            .buffered(self.max_concurrent_queries)
            .collect()
            .await
    }

    async fn list_channel_contents<C>(
        &self,
        connection: &C,
        channels: &IndexSet<ChannelRef>,
    ) -> Vec<ChannelContents>
    where
        C: ConnectionHandle + ?Sized,
    {
        stream::iter(channels.iter().cloned())
            .map(|channel| async move {
                let (instantiated, organizations) = futures::join!(
                    connection.list_instantiated_chaincode(&channel),
                    connection.list_organizations(&channel)
                );
                let instantiated = instantiated
                    .and_then(|instantiated| instantiated_entries(&channel, instantiated));
                let organizations = organizations.and_then(validate_organizations);
                (channel, instantiated, organizations)
            })
            .buffered(self.max_concurrent_queries)
            .collect()
            .await
    }

    fn merge_channels(
        &self,
        snapshot: &mut TopologySnapshot,
        peer: &PeerRef,
        channels: Result<IndexSet<ChannelRef>, TransportError>,
    ) {
        match channels.tap_err(|fault| warn!(%peer, ?fault, "Failed to list channels")) {
            Ok(channels) => {
                for channel in &channels {
                    snapshot
                        .channel_peers
                        .entry(channel.clone())
                        .or_default()
                        .insert(peer.clone());
                }
                snapshot.peer_channels.insert(peer.clone(), channels);
            }
            Err(fault) => {
                for error in BranchError::channel_map(peer, &fault, self.classifier.as_ref()) {
                    self.record(snapshot, error);
                }
            }
        }
    }

    fn merge_installed(
        &self,
        snapshot: &mut TopologySnapshot,
        peer: PeerRef,
        installed: Result<Vec<InstalledChaincodeEntry>, TransportError>,
    ) {
        match installed.tap_err(|fault| warn!(%peer, ?fault, "Failed to list installed chaincode")) {
            Ok(entries) => {
                snapshot.installed.insert(peer, entries);
            }
            Err(fault) => self.record(snapshot, BranchError::installed_chaincode(&peer, &fault)),
        }
    }

    fn merge_channel_contents(&self, snapshot: &mut TopologySnapshot, contents: ChannelContents) {
        let (channel, instantiated, organizations) = contents;
        match instantiated
            .tap_err(|fault| warn!(%channel, ?fault, "Failed to list instantiated chaincode"))
        {
            Ok(entries) => {
                snapshot.instantiated.insert(channel.clone(), entries);
            }
            Err(fault) => {
                self.record(snapshot, BranchError::instantiated_chaincode(&channel, &fault))
            }
        }

        match organizations.tap_err(|fault| warn!(%channel, ?fault, "Failed to list organizations")) {
            Ok(organizations) => {
                snapshot.organizations.insert(channel, organizations);
            }
            Err(fault) => self.record(snapshot, BranchError::organizations(&channel, &fault)),
        }
    }

    fn record(&self, snapshot: &mut TopologySnapshot, error: BranchError) {
        if let Some(metrics) = &self.metrics {
            metrics
                .branch_errors
                .with_label_values(&[error.kind.as_str()])
                .inc();
        }
        snapshot.errors.push(error);
    }
}

/// Channels reported by the peers whose listing succeeded, in peer order then listing order.
fn discovered_channels(listings: &[ChannelListing]) -> IndexSet<ChannelRef> {
    listings
        .iter()
        .filter_map(|(_, channels)| channels.as_ref().ok())
        .flatten()
        .cloned()
        .collect()
}

fn validate_peers(peers: Vec<PeerRef>) -> Result<IndexSet<PeerRef>, TransportError> {
    if peers.iter().any(|peer| peer.as_str().is_empty()) {
        return Err(TransportError::malformed("peer list contains an empty name"));
    }
    Ok(peers.into_iter().collect())
}

fn validate_channels(channels: Vec<ChannelRef>) -> Result<IndexSet<ChannelRef>, TransportError> {
    if channels.iter().any(|channel| channel.as_str().is_empty()) {
        return Err(TransportError::malformed("channel list contains an empty name"));
    }
    Ok(channels.into_iter().collect())
}

fn validate_organizations(
    organizations: Vec<OrganizationRef>,
) -> Result<Vec<OrganizationRef>, TransportError> {
    if organizations.iter().any(|org| org.as_str().is_empty()) {
        return Err(TransportError::malformed(
            "organization list contains an empty id",
        ));
    }
    let distinct: IndexSet<_> = organizations.into_iter().collect();
    Ok(distinct.into_iter().collect())
}

fn installed_entries(
    peer: &PeerRef,
    installed: InstalledChaincodeMap,
) -> Result<Vec<InstalledChaincodeEntry>, TransportError> {
    let mut seen = IndexSet::new();
    for (name, versions) in installed {
        if name.is_empty() {
            return Err(TransportError::malformed(
                "installed chaincode with an empty name",
            ));
        }
        for version in versions {
            if version.is_empty() {
                return Err(TransportError::malformed(format!(
                    "installed chaincode {name} has an empty version"
                )));
            }
            seen.insert((name.clone(), version));
        }
    }
    Ok(seen
        .into_iter()
        .map(|(name, version)| InstalledChaincodeEntry {
            name,
            version,
            peer: peer.clone(),
        })
        .collect())
}

fn instantiated_entries(
    channel: &ChannelRef,
    instantiated: Vec<ChaincodeRef>,
) -> Result<Vec<InstantiatedChaincodeEntry>, TransportError> {
    instantiated
        .into_iter()
        .map(|ChaincodeRef { name, version }| {
            if name.is_empty() || version.is_empty() {
                return Err(TransportError::malformed(
                    "instantiated chaincode with an empty name or version",
                ));
            }
            Ok(InstantiatedChaincodeEntry {
                name,
                version,
                channel: channel.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "unit_tests/builder_tests.rs"]
mod builder_tests;
