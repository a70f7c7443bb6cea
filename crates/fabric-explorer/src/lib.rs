// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A live view over a running Fabric network.
//!
//! The [`TopologySnapshotBuilder`] fans out queries against a [`ConnectionHandle`] and collects the
//! results, together with any per-branch failures, into an immutable [`TopologySnapshot`]. The
//! [`TreeProjector`] turns a snapshot into the node descriptors of a lazily expanded tree, and the
//! [`RuntimeExplorer`] ties both to a [`FabricRuntime`], caching one render pass at a time and
//! rebuilding it whenever the runtime changes state or a refresh is requested.

pub mod builder;
pub mod config;
pub mod connection;
pub mod error;
pub mod explorer;
pub mod metrics;
pub mod output;
pub mod runtime;
pub mod snapshot;
#[cfg(any(test, feature = "test-utils"))]
pub mod telemetry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_connection;
pub mod tree;

pub use builder::TopologySnapshotBuilder;
pub use config::ExplorerConfig;
pub use connection::{ChaincodeRef, ChannelRef, ConnectionHandle, OrganizationRef, PeerRef};
pub use error::{
    BranchError, BranchKind, BranchScope, ExplorerError, ExplorerResult, FaultClassifier,
    StatusPatternClassifier, TransportError,
};
pub use explorer::{RuntimeExplorer, TreeChange};
pub use metrics::ExplorerMetrics;
pub use output::{OutputSink, Severity, TracingOutputSink};
pub use runtime::{FabricRuntime, RuntimeState, RuntimeStateWatcher};
pub use snapshot::{InstalledChaincodeEntry, InstantiatedChaincodeEntry, TopologySnapshot};
pub use tree::{CollapsibleState, ContextValue, ExplorerCommand, NodeKind, TreeNode, TreeProjector};
