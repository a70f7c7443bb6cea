// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::connection::{ChannelRef, OrganizationRef, PeerRef};
use crate::error::BranchKind;
use crate::runtime::RuntimeState;
use crate::snapshot::{InstalledChaincodeEntry, InstantiatedChaincodeEntry, TopologySnapshot};

pub const SMART_CONTRACTS_LABEL: &str = "Smart Contracts";
pub const INSTANTIATED_LABEL: &str = "Instantiated";
pub const INSTALLED_LABEL: &str = "Installed";
pub const CHANNELS_LABEL: &str = "Channels";
pub const NODES_LABEL: &str = "Nodes";
pub const ORGANIZATIONS_LABEL: &str = "Organizations";
pub const INSTANTIATE_LABEL: &str = "+ Instantiate";
pub const INSTALL_LABEL: &str = "+ Install";

/// Identity of a node in the tree. Two nodes with the same kind are the same node across
/// projections, which is what the children cache and `refresh` key on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Runtime,
    SmartContracts,
    InstantiatedSmartContracts,
    InstalledSmartContracts,
    Channels,
    Nodes,
    Organizations,
    Channel(ChannelRef),
    Peer(PeerRef),
    Organization(OrganizationRef),
    InstantiatedChaincode {
        name: String,
        version: String,
        channel: ChannelRef,
    },
    InstalledChaincode {
        name: String,
        version: String,
        peer: PeerRef,
    },
    InstantiateCommand,
    InstallCommand,
}

impl NodeKind {
    /// The node this one is listed under, `None` for top-level nodes.
    pub fn parent(&self) -> Option<NodeKind> {
        match self {
            NodeKind::Runtime
            | NodeKind::SmartContracts
            | NodeKind::Channels
            | NodeKind::Nodes
            | NodeKind::Organizations => None,
            NodeKind::InstantiatedSmartContracts | NodeKind::InstalledSmartContracts => {
                Some(NodeKind::SmartContracts)
            }
            NodeKind::Channel(_) => Some(NodeKind::Channels),
            NodeKind::Peer(_) => Some(NodeKind::Nodes),
            NodeKind::Organization(_) => Some(NodeKind::Organizations),
            NodeKind::InstantiatedChaincode { .. } | NodeKind::InstantiateCommand => {
                Some(NodeKind::InstantiatedSmartContracts)
            }
            NodeKind::InstalledChaincode { .. } | NodeKind::InstallCommand => {
                Some(NodeKind::InstalledSmartContracts)
            }
        }
    }

    /// True if `self` is `other` or sits anywhere below it.
    pub fn is_within(&self, other: &NodeKind) -> bool {
        let mut current = Some(self.clone());
        while let Some(kind) = current {
            if &kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// The branch whose errors are surfaced when this node is expanded.
    pub fn branch(&self) -> Option<BranchKind> {
        match self {
            NodeKind::InstantiatedSmartContracts => Some(BranchKind::InstantiatedChaincode),
            NodeKind::InstalledSmartContracts => Some(BranchKind::InstalledChaincode),
            NodeKind::Channels => Some(BranchKind::Channels),
            NodeKind::Nodes => Some(BranchKind::Peers),
            NodeKind::Organizations => Some(BranchKind::Organizations),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollapsibleState {
    None,
    Collapsed,
    Expanded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextValue {
    Runtime,
    SmartContracts,
    InstantiatedSmartContracts,
    InstalledSmartContracts,
    Channels,
    Nodes,
    Organizations,
    Channel,
    Peer,
    Organization,
    InstantiatedChaincode,
    InstalledChaincode,
    InstantiateCommand,
    InstallCommand,
}

impl ContextValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextValue::Runtime => "blockchain-runtime-item",
            ContextValue::SmartContracts => "blockchain-runtime-smart-contracts-item",
            ContextValue::InstantiatedSmartContracts => {
                "blockchain-runtime-instantiated-smart-contracts-item"
            }
            ContextValue::InstalledSmartContracts => {
                "blockchain-runtime-installed-smart-contracts-item"
            }
            ContextValue::Channels => "blockchain-runtime-channels-item",
            ContextValue::Nodes => "blockchain-runtime-nodes-item",
            ContextValue::Organizations => "blockchain-runtime-organizations-item",
            ContextValue::Channel => "blockchain-channel-item",
            ContextValue::Peer => "blockchain-peer-item",
            ContextValue::Organization => "blockchain-runtime-org-item",
            ContextValue::InstantiatedChaincode => "blockchain-instantiated-chaincode-item",
            ContextValue::InstalledChaincode => "blockchain-runtime-installed-chaincode-item",
            ContextValue::InstantiateCommand => "blockchain-runtime-instantiate-command-item",
            ContextValue::InstallCommand => "blockchain-runtime-installed-command-item",
        }
    }
}

/// Action attached to a node, run by the host when the node is clicked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExplorerCommand {
    StartRuntime,
    InstallSmartContract,
    InstantiateSmartContract,
}

impl ExplorerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplorerCommand::StartRuntime => "start-fabric-runtime",
            ExplorerCommand::InstallSmartContract => "install-smart-contract",
            ExplorerCommand::InstantiateSmartContract => "instantiate-smart-contract",
        }
    }
}

/// Everything the host needs to render one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub label: String,
    pub collapsible_state: CollapsibleState,
    pub context_value: ContextValue,
    pub tooltip: Option<String>,
    pub command: Option<ExplorerCommand>,
}

impl TreeNode {
    fn new(
        kind: NodeKind,
        label: impl Into<String>,
        collapsible_state: CollapsibleState,
        context_value: ContextValue,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            collapsible_state,
            context_value,
            tooltip: None,
            command: None,
        }
    }

    fn leaf(kind: NodeKind, label: impl Into<String>, context_value: ContextValue) -> Self {
        Self::new(kind, label, CollapsibleState::None, context_value)
    }

    fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    fn with_command(mut self, command: ExplorerCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn is_expandable(&self) -> bool {
        self.collapsible_state != CollapsibleState::None
    }
}

/// What the root of the tree shows for one render pass.
#[derive(Clone, Debug)]
pub enum RootView {
    NotRunning(RuntimeState),
    Running(Arc<TopologySnapshot>),
}

/// Children of a node, plus the indices of the snapshot errors belonging to that branch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    pub nodes: Vec<TreeNode>,
    pub errors: Vec<usize>,
}

/// Stateless mapping from a [`RootView`] to tree nodes.
pub struct TreeProjector;

impl TreeProjector {
    pub fn project_root(view: &RootView) -> Vec<TreeNode> {
        match view {
            RootView::NotRunning(state) => vec![runtime_node(*state)],
            RootView::Running(_) => vec![
                TreeNode::new(
                    NodeKind::SmartContracts,
                    SMART_CONTRACTS_LABEL,
                    CollapsibleState::Expanded,
                    ContextValue::SmartContracts,
                ),
                TreeNode::new(
                    NodeKind::Channels,
                    CHANNELS_LABEL,
                    CollapsibleState::Collapsed,
                    ContextValue::Channels,
                ),
                TreeNode::new(
                    NodeKind::Nodes,
                    NODES_LABEL,
                    CollapsibleState::Collapsed,
                    ContextValue::Nodes,
                ),
                TreeNode::new(
                    NodeKind::Organizations,
                    ORGANIZATIONS_LABEL,
                    CollapsibleState::Collapsed,
                    ContextValue::Organizations,
                ),
            ],
        }
    }

    pub fn project_children(view: &RootView, parent: &NodeKind) -> Projection {
        let snapshot = match view {
            RootView::NotRunning(_) => return Projection::default(),
            RootView::Running(snapshot) => snapshot,
        };
        let nodes = match parent {
            NodeKind::SmartContracts => vec![
                TreeNode::new(
                    NodeKind::InstantiatedSmartContracts,
                    INSTANTIATED_LABEL,
                    CollapsibleState::Expanded,
                    ContextValue::InstantiatedSmartContracts,
                ),
                TreeNode::new(
                    NodeKind::InstalledSmartContracts,
                    INSTALLED_LABEL,
                    CollapsibleState::Expanded,
                    ContextValue::InstalledSmartContracts,
                ),
            ],
            NodeKind::InstantiatedSmartContracts => snapshot
                .instantiated_chaincode()
                .map(instantiated_node)
                .chain(std::iter::once(
                    TreeNode::leaf(
                        NodeKind::InstantiateCommand,
                        INSTANTIATE_LABEL,
                        ContextValue::InstantiateCommand,
                    )
                    .with_command(ExplorerCommand::InstantiateSmartContract),
                ))
                .collect(),
            NodeKind::InstalledSmartContracts => snapshot
                .installed_chaincode()
                .map(installed_node)
                .chain(std::iter::once(
                    TreeNode::leaf(
                        NodeKind::InstallCommand,
                        INSTALL_LABEL,
                        ContextValue::InstallCommand,
                    )
                    .with_command(ExplorerCommand::InstallSmartContract),
                ))
                .collect(),
            NodeKind::Channels => snapshot
                .channels()
                .map(|channel| channel_node(snapshot, channel))
                .collect(),
            NodeKind::Nodes => snapshot
                .peers()
                .map(|peer| {
                    TreeNode::leaf(NodeKind::Peer(peer.clone()), peer.as_str(), ContextValue::Peer)
                })
                .collect(),
            NodeKind::Organizations => snapshot
                .distinct_organizations()
                .into_iter()
                .map(|org| {
                    TreeNode::leaf(
                        NodeKind::Organization(org.clone()),
                        org.as_str(),
                        ContextValue::Organization,
                    )
                })
                .collect(),
            _ => vec![],
        };
        let errors = parent
            .branch()
            .map(|branch| snapshot.error_indices(branch).collect())
            .unwrap_or_default();
        Projection { nodes, errors }
    }
}

fn runtime_node(state: RuntimeState) -> TreeNode {
    let label = match state {
        RuntimeState::Starting => "Local fabric runtime is starting...",
        RuntimeState::Stopping => "Local fabric runtime is stopping...",
        RuntimeState::Busy => "Local fabric runtime is busy...",
        // `Running` here means the last published state disagrees with `is_running()`, which is
        // authoritative. The runtime is not up, so it is offered for starting like a stopped one.
        RuntimeState::Stopped | RuntimeState::Running => {
            return TreeNode::leaf(
                NodeKind::Runtime,
                "Local fabric runtime is stopped. Click to start.",
                ContextValue::Runtime,
            )
            .with_command(ExplorerCommand::StartRuntime);
        }
    };
    TreeNode::leaf(NodeKind::Runtime, label, ContextValue::Runtime)
}

fn channel_node(snapshot: &TopologySnapshot, channel: &ChannelRef) -> TreeNode {
    let node = TreeNode::leaf(
        NodeKind::Channel(channel.clone()),
        channel.as_str(),
        ContextValue::Channel,
    );
    match snapshot.peers_of(channel) {
        Some(peers) if !peers.is_empty() => {
            let peers: Vec<_> = peers.iter().map(PeerRef::as_str).collect();
            node.with_tooltip(format!("Associated peers: {}", peers.join(", ")))
        }
        _ => node,
    }
}

fn instantiated_node(entry: &InstantiatedChaincodeEntry) -> TreeNode {
    TreeNode::leaf(
        NodeKind::InstantiatedChaincode {
            name: entry.name.clone(),
            version: entry.version.clone(),
            channel: entry.channel.clone(),
        },
        format!("{}@{}", entry.name, entry.version),
        ContextValue::InstantiatedChaincode,
    )
    .with_tooltip(format!("Instantiated on: {}", entry.channel))
}

fn installed_node(entry: &InstalledChaincodeEntry) -> TreeNode {
    TreeNode::leaf(
        NodeKind::InstalledChaincode {
            name: entry.name.clone(),
            version: entry.version.clone(),
            peer: entry.peer.clone(),
        },
        format!("{} v{}", entry.name, entry.version),
        ContextValue::InstalledChaincode,
    )
    .with_tooltip(format!("Installed on: {}", entry.peer))
}

#[cfg(test)]
#[path = "unit_tests/tree_tests.rs"]
mod tree_tests;
