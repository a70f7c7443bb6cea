// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

use crate::builder::TopologySnapshotBuilder;
use crate::config::ExplorerConfig;
use crate::error::{ExplorerError, ExplorerResult, CONTROL_PANEL_PREFIX};
use crate::metrics::ExplorerMetrics;
use crate::output::{OutputSink, Severity};
use crate::runtime::FabricRuntime;
use crate::snapshot::TopologySnapshot;
use crate::tree::{NodeKind, Projection, RootView, TreeNode, TreeProjector};

const TREE_CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Sent to observers when part of the tree has to be rendered again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    /// The whole tree, starting at the root.
    Tree,
    /// The subtree under this node.
    Node(NodeKind),
}

/// Everything derived from one aggregation pass. Dropped as a whole when superseded.
struct RenderPass {
    sequence: u64,
    view: RootView,
    children: Mutex<HashMap<NodeKind, Vec<TreeNode>>>,
    // Indices into the snapshot's errors that have already reached the output sink.
    reported: Mutex<HashSet<usize>>,
}

impl RenderPass {
    fn new(sequence: u64, view: RootView) -> Self {
        Self {
            sequence,
            view,
            children: Mutex::new(HashMap::new()),
            reported: Mutex::new(HashSet::new()),
        }
    }
}

/// Serves the runtime tree to a host that expands it lazily.
///
/// Each call to [`RuntimeExplorer::get_root_nodes`] starts a new aggregation pass with a higher
/// sequence number. A pass is installed only if no newer pass has been installed and no full
/// refresh happened after it started, so a slow pass can never overwrite a fresher one.
/// Children are projected from the installed pass on first expansion and cached until refreshed.
pub struct RuntimeExplorer<R: FabricRuntime> {
    runtime: Arc<R>,
    builder: TopologySnapshotBuilder,
    output: Arc<dyn OutputSink>,
    metrics: Arc<ExplorerMetrics>,
    runtime_name: String,
    next_sequence: AtomicU64,
    pass: ArcSwapOption<RenderPass>,
    // Highest sequence number invalidated by a full refresh. Also serializes pass installation.
    invalidated_through: Mutex<u64>,
    changes: broadcast::Sender<TreeChange>,
}

impl<R: FabricRuntime> RuntimeExplorer<R> {
    pub fn new(
        runtime: Arc<R>,
        config: &ExplorerConfig,
        output: Arc<dyn OutputSink>,
        metrics: Arc<ExplorerMetrics>,
    ) -> Self {
        let builder = TopologySnapshotBuilder::from_config(config).metrics(metrics.clone());
        let (changes, _) = broadcast::channel(TREE_CHANGE_CHANNEL_CAPACITY);
        Self {
            runtime,
            builder,
            output,
            metrics,
            runtime_name: config.runtime_name.clone(),
            next_sequence: AtomicU64::new(0),
            pass: ArcSwapOption::empty(),
            invalidated_through: Mutex::new(0),
            changes,
        }
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    /// Observe refresh notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<TreeChange> {
        self.changes.subscribe()
    }

    /// Start a new aggregation pass and return the top-level nodes.
    pub async fn get_root_nodes(&self) -> Vec<TreeNode> {
        let pass = self.start_pass().await;
        TreeProjector::project_root(&pass.view)
    }

    /// Children of `parent` in the installed pass, projecting and caching them on first request.
    /// Errors recorded for the branch reach the output sink the first time it is projected in a
    /// pass.
    pub async fn get_child_nodes(&self, parent: &NodeKind) -> Vec<TreeNode> {
        let pass = match self.pass.load_full() {
            Some(pass) => pass,
            None => self.start_pass().await,
        };
        if let Some(children) = pass.children.lock().get(parent) {
            return children.clone();
        }

        let Projection { nodes, errors } = TreeProjector::project_children(&pass.view, parent);
        if let RootView::Running(snapshot) = &pass.view {
            let unreported: Vec<usize> = {
                let mut reported = pass.reported.lock();
                errors
                    .into_iter()
                    .filter(|index| reported.insert(*index))
                    .collect()
            };
            for index in unreported {
                if let Some(error) = snapshot.errors().get(index) {
                    self.output
                        .report(Severity::Error, &error.message, &error.detail);
                }
            }
        }
        pass.children.lock().insert(parent.clone(), nodes.clone());
        nodes
    }

    /// Drop cached projections for `node` and everything below it, or for the whole tree when
    /// `node` is `None`, and tell observers to render them again. A whole-tree refresh also drops
    /// the snapshot, so the next request re-queries the network.
    pub fn refresh(&self, node: Option<&NodeKind>) {
        match node {
            None => {
                {
                    let mut invalidated_through = self.invalidated_through.lock();
                    *invalidated_through = self.next_sequence.load(Ordering::SeqCst);
                    self.pass.store(None);
                }
                debug!(runtime = %self.runtime_name, "Refreshing runtime tree");
                let _ = self.changes.send(TreeChange::Tree);
            }
            Some(kind) => {
                if let Some(pass) = self.pass.load_full() {
                    pass.children
                        .lock()
                        .retain(|cached, _| !cached.is_within(kind));
                }
                debug!(runtime = %self.runtime_name, node = ?kind, "Refreshing subtree");
                let _ = self.changes.send(TreeChange::Node(kind.clone()));
            }
        }
    }

    /// Refresh the whole tree on every runtime state transition. The task ends when the runtime
    /// drops its watcher or the explorer is dropped.
    pub fn watch_runtime(self: &Arc<Self>) -> JoinHandle<()> {
        let mut receiver = self.runtime.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let state = *receiver.borrow_and_update();
                let Some(explorer) = weak.upgrade() else {
                    break;
                };
                debug!(%state, "Runtime state changed");
                explorer.refresh(None);
            }
        })
    }

    async fn start_pass(&self) -> Arc<RenderPass> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.metrics
            .aggregation_passes
            .with_label_values(&[&self.runtime_name])
            .inc();
        let view = self
            .load_view()
            .instrument(info_span!("aggregation_pass", sequence))
            .await;
        self.install(Arc::new(RenderPass::new(sequence, view)))
    }

    async fn load_view(&self) -> RootView {
        if !self.runtime.is_running().await {
            return RootView::NotRunning(self.runtime.state());
        }
        match self.connect().await {
            Ok(connection) => {
                RootView::Running(Arc::new(self.builder.build(connection.as_ref()).await))
            }
            Err(err) => {
                error!(%err, "Unable to populate runtime tree");
                if let ExplorerError::Connection { source, .. } = &err {
                    let message = format!("{CONTROL_PANEL_PREFIX}: {}", source.message_or_rendered());
                    self.output.report(Severity::Error, &message, &message);
                }
                RootView::Running(Arc::new(TopologySnapshot::empty()))
            }
        }
    }

    async fn connect(&self) -> ExplorerResult<Arc<R::Connection>> {
        self.runtime
            .connect()
            .await
            .map_err(|source| ExplorerError::Connection {
                runtime: self.runtime_name.clone(),
                source,
            })
    }

    /// Install `pass` unless something newer already superseded it. Returns the pass callers
    /// should render from.
    fn install(&self, pass: Arc<RenderPass>) -> Arc<RenderPass> {
        let invalidated_through = self.invalidated_through.lock();
        let current = self.pass.load_full();
        let superseded = pass.sequence <= *invalidated_through
            || current
                .as_ref()
                .is_some_and(|current| current.sequence > pass.sequence);
        if superseded {
            debug!(
                sequence = pass.sequence,
                invalidated_through = *invalidated_through,
                "Discarding stale aggregation pass"
            );
            self.metrics.stale_passes_discarded.inc();
            return current.unwrap_or(pass);
        }
        self.pass.store(Some(pass.clone()));
        pass
    }
}

#[cfg(test)]
#[path = "unit_tests/explorer_tests.rs"]
mod explorer_tests;
