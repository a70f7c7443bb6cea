// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use indexmap::{IndexMap, IndexSet};

use crate::connection::{ChannelRef, OrganizationRef, PeerRef};
use crate::error::{BranchError, BranchKind};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstalledChaincodeEntry {
    pub name: String,
    pub version: String,
    pub peer: PeerRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstantiatedChaincodeEntry {
    pub name: String,
    pub version: String,
    pub channel: ChannelRef,
}

/// The topology of a network as observed by one aggregation pass.
///
/// Every map is ordered by discovery: peers in the order the network listed them, channels in
/// the order they were first reported while walking the peers. A key whose query failed has no
/// entry at all, and the failure is in [`TopologySnapshot::errors`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    pub(crate) peers: IndexSet<PeerRef>,
    pub(crate) peer_channels: IndexMap<PeerRef, IndexSet<ChannelRef>>,
    pub(crate) channel_peers: IndexMap<ChannelRef, IndexSet<PeerRef>>,
    pub(crate) installed: IndexMap<PeerRef, Vec<InstalledChaincodeEntry>>,
    pub(crate) instantiated: IndexMap<ChannelRef, Vec<InstantiatedChaincodeEntry>>,
    pub(crate) organizations: IndexMap<ChannelRef, Vec<OrganizationRef>>,
    pub(crate) errors: Vec<BranchError>,
}

impl TopologySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerRef> {
        self.peers.iter()
    }

    /// Distinct channels, in discovery order.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelRef> {
        self.channel_peers.keys()
    }

    /// Channels joined by `peer`, or `None` if the peer is unknown or its channel query failed.
    pub fn channels_of(&self, peer: &PeerRef) -> Option<&IndexSet<ChannelRef>> {
        self.peer_channels.get(peer)
    }

    /// Peers that reported `channel` as joined.
    pub fn peers_of(&self, channel: &ChannelRef) -> Option<&IndexSet<PeerRef>> {
        self.channel_peers.get(channel)
    }

    pub fn installed_on(&self, peer: &PeerRef) -> Option<&[InstalledChaincodeEntry]> {
        self.installed.get(peer).map(Vec::as_slice)
    }

    pub fn instantiated_on(&self, channel: &ChannelRef) -> Option<&[InstantiatedChaincodeEntry]> {
        self.instantiated.get(channel).map(Vec::as_slice)
    }

    pub fn organizations_of(&self, channel: &ChannelRef) -> Option<&[OrganizationRef]> {
        self.organizations.get(channel).map(Vec::as_slice)
    }

    /// Installed chaincode across all peers, in peer order.
    pub fn installed_chaincode(&self) -> impl Iterator<Item = &InstalledChaincodeEntry> {
        self.installed.values().flatten()
    }

    /// Instantiated chaincode across all channels, in channel order.
    pub fn instantiated_chaincode(&self) -> impl Iterator<Item = &InstantiatedChaincodeEntry> {
        self.instantiated.values().flatten()
    }

    /// Organizations across all channels, deduplicated by id in first-seen order.
    pub fn distinct_organizations(&self) -> IndexSet<&OrganizationRef> {
        self.organizations.values().flatten().collect()
    }

    pub fn errors(&self) -> &[BranchError] {
        &self.errors
    }

    /// Indices into [`TopologySnapshot::errors`] of the errors recorded for `kind`.
    pub fn error_indices(&self, kind: BranchKind) -> impl Iterator<Item = usize> + '_ {
        self.errors
            .iter()
            .enumerate()
            .filter(move |(_, error)| error.kind == kind)
            .map(|(index, _)| index)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
