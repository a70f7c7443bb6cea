// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process collaborators for tests: a network described in memory, with per-query fault and
//! latency injection, a runtime wrapping it, and an output sink that records reports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::connection::{
    ChaincodeRef, ChannelRef, ConnectionHandle, InstalledChaincodeMap, OrganizationRef, PeerRef,
};
use crate::error::TransportError;
use crate::output::{OutputSink, Severity};
use crate::runtime::{FabricRuntime, RuntimeState, RuntimeStateWatcher};

#[derive(Clone, Debug, Default)]
pub struct LocalNetwork {
    pub peers: Vec<PeerRef>,
    pub channels: IndexMap<PeerRef, Vec<ChannelRef>>,
    pub installed: IndexMap<PeerRef, InstalledChaincodeMap>,
    pub instantiated: IndexMap<ChannelRef, Vec<ChaincodeRef>>,
    pub organizations: IndexMap<ChannelRef, Vec<OrganizationRef>>,
}

impl LocalNetwork {
    pub fn with_peer(mut self, peer: &str, channels: &[&str]) -> Self {
        let peer = PeerRef::from(peer);
        self.peers.push(peer.clone());
        self.channels
            .insert(peer, channels.iter().map(|c| ChannelRef::from(*c)).collect());
        self
    }

    pub fn with_installed(mut self, peer: &str, name: &str, versions: &[&str]) -> Self {
        self.installed.entry(PeerRef::from(peer)).or_default().insert(
            name.to_owned(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn with_instantiated(mut self, channel: &str, name: &str, version: &str) -> Self {
        self.instantiated
            .entry(ChannelRef::from(channel))
            .or_default()
            .push(ChaincodeRef::new(name, version));
        self
    }

    pub fn with_organizations(mut self, channel: &str, ids: &[&str]) -> Self {
        self.organizations
            .entry(ChannelRef::from(channel))
            .or_default()
            .extend(ids.iter().map(|id| OrganizationRef::from(*id)));
        self
    }
}

/// Two peers sharing `channelTwo`, each with its own installed chaincode.
pub fn sample_network() -> LocalNetwork {
    LocalNetwork::default()
        .with_peer("peerOne", &["channelOne", "channelTwo"])
        .with_peer("peerTwo", &["channelTwo"])
        .with_installed("peerOne", "sample-car-network", &["1.0", "1.2"])
        .with_installed("peerOne", "sample-food-network", &["0.6"])
        .with_installed("peerTwo", "biscuit-network", &["0.7"])
        .with_instantiated("channelOne", "biscuit-network", "0.7")
        .with_instantiated("channelTwo", "cake-network", "0.10")
        .with_organizations("channelOne", &["Org1", "Org2"])
        .with_organizations("channelTwo", &["Org3"])
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Query {
    Peers,
    Channels(PeerRef),
    InstalledChaincode(PeerRef),
    InstantiatedChaincode(ChannelRef),
    Organizations(ChannelRef),
}

impl Query {
    pub fn channels(peer: &str) -> Self {
        Query::Channels(PeerRef::from(peer))
    }

    pub fn installed(peer: &str) -> Self {
        Query::InstalledChaincode(PeerRef::from(peer))
    }

    pub fn instantiated(channel: &str) -> Self {
        Query::InstantiatedChaincode(ChannelRef::from(channel))
    }

    pub fn organizations(channel: &str) -> Self {
        Query::Organizations(ChannelRef::from(channel))
    }
}

#[derive(Default)]
pub struct LocalConnection {
    network: Mutex<LocalNetwork>,
    faults: Mutex<HashMap<Query, TransportError>>,
    delays: Mutex<HashMap<Query, Duration>>,
    calls: Mutex<Vec<Query>>,
}

impl LocalConnection {
    pub fn new(network: LocalNetwork) -> Self {
        Self {
            network: Mutex::new(network),
            ..Default::default()
        }
    }

    pub fn set_network(&self, network: LocalNetwork) {
        *self.network.lock() = network;
    }

    /// Make every later call matching `query` fail with `fault`.
    pub fn fail(&self, query: Query, fault: impl Into<TransportError>) {
        self.faults.lock().insert(query, fault.into());
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Make every later call matching `query` sleep before answering.
    pub fn delay(&self, query: Query, delay: Duration) {
        self.delays.lock().insert(query, delay);
    }

    pub fn calls(&self) -> Vec<Query> {
        self.calls.lock().clone()
    }

    async fn enter(&self, query: Query) -> Result<(), TransportError> {
        self.calls.lock().push(query.clone());
        let delay = self.delays.lock().get(&query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.faults.lock().get(&query) {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConnectionHandle for LocalConnection {
    async fn list_peers(&self) -> Result<Vec<PeerRef>, TransportError> {
        self.enter(Query::Peers).await?;
        Ok(self.network.lock().peers.clone())
    }

    async fn list_channels(&self, peer: &PeerRef) -> Result<Vec<ChannelRef>, TransportError> {
        self.enter(Query::Channels(peer.clone())).await?;
        Ok(self
            .network
            .lock()
            .channels
            .get(peer)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_installed_chaincode(
        &self,
        peer: &PeerRef,
    ) -> Result<InstalledChaincodeMap, TransportError> {
        self.enter(Query::InstalledChaincode(peer.clone())).await?;
        Ok(self
            .network
            .lock()
            .installed
            .get(peer)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_instantiated_chaincode(
        &self,
        channel: &ChannelRef,
    ) -> Result<Vec<ChaincodeRef>, TransportError> {
        self.enter(Query::InstantiatedChaincode(channel.clone()))
            .await?;
        Ok(self
            .network
            .lock()
            .instantiated
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_organizations(
        &self,
        channel: &ChannelRef,
    ) -> Result<Vec<OrganizationRef>, TransportError> {
        self.enter(Query::Organizations(channel.clone())).await?;
        Ok(self
            .network
            .lock()
            .organizations
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct LocalRuntime {
    running: AtomicBool,
    watcher: RuntimeStateWatcher,
    connection: ArcSwap<LocalConnection>,
    connect_fault: Mutex<Option<TransportError>>,
}

impl LocalRuntime {
    pub fn new(connection: Arc<LocalConnection>) -> Self {
        Self {
            running: AtomicBool::new(false),
            watcher: RuntimeStateWatcher::default(),
            connection: ArcSwap::new(connection),
            connect_fault: Mutex::new(None),
        }
    }

    pub fn new_running(connection: Arc<LocalConnection>) -> Self {
        let runtime = Self::new(connection);
        runtime.set_running(true);
        runtime
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        self.watcher.publish(if running {
            RuntimeState::Running
        } else {
            RuntimeState::Stopped
        });
    }

    pub fn publish(&self, state: RuntimeState) {
        self.watcher.publish(state);
    }

    pub fn set_connection(&self, connection: Arc<LocalConnection>) {
        self.connection.store(connection);
    }

    pub fn fail_connect(&self, fault: impl Into<TransportError>) {
        *self.connect_fault.lock() = Some(fault.into());
    }
}

#[async_trait]
impl FabricRuntime for LocalRuntime {
    type Connection = LocalConnection;

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn state(&self) -> RuntimeState {
        self.watcher.current()
    }

    async fn connect(&self) -> Result<Arc<LocalConnection>, TransportError> {
        if let Some(fault) = self.connect_fault.lock().clone() {
            return Err(fault);
        }
        Ok(self.connection.load_full())
    }

    fn subscribe(&self) -> watch::Receiver<RuntimeState> {
        self.watcher.subscribe()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,
    pub message: String,
    pub detail: String,
}

#[derive(Default)]
pub struct RecordingOutputSink {
    reports: Mutex<Vec<Report>>,
}

impl RecordingOutputSink {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn errors(&self) -> Vec<Report> {
        self.reports
            .lock()
            .iter()
            .filter(|report| report.severity == Severity::Error)
            .cloned()
            .collect()
    }
}

impl OutputSink for RecordingOutputSink {
    fn report(&self, severity: Severity, message: &str, detail: &str) {
        self.reports.lock().push(Report {
            severity,
            message: message.to_owned(),
            detail: detail.to_owned(),
        });
    }
}
