// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::error::TransportError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RuntimeState {
    #[default]
    Stopped,
    Starting,
    Running,
    Busy,
    Stopping,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::Stopped => "stopped",
            RuntimeState::Starting => "starting",
            RuntimeState::Running => "running",
            RuntimeState::Busy => "busy",
            RuntimeState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A local Fabric runtime the explorer is attached to.
#[async_trait]
pub trait FabricRuntime: Send + Sync + 'static {
    type Connection: ConnectionHandle;

    async fn is_running(&self) -> bool;

    /// The last state published by the runtime.
    fn state(&self) -> RuntimeState;

    /// Open a connection to the running network.
    async fn connect(&self) -> Result<std::sync::Arc<Self::Connection>, TransportError>;

    /// A receiver that is notified on every state transition.
    fn subscribe(&self) -> watch::Receiver<RuntimeState>;
}

/// Publishes runtime state transitions to any number of subscribers.
///
/// Runtimes embed one of these and call [`RuntimeStateWatcher::publish`] whenever they change
/// state. Every publish wakes subscribers, including one that repeats the current state, since a
/// runtime going busy twice still means its topology may have changed.
#[derive(Debug)]
pub struct RuntimeStateWatcher {
    sender: watch::Sender<RuntimeState>,
}

impl Default for RuntimeStateWatcher {
    fn default() -> Self {
        Self::new(RuntimeState::default())
    }
}

impl RuntimeStateWatcher {
    pub fn new(initial: RuntimeState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn publish(&self, state: RuntimeState) {
        debug!(%state, "Runtime state changed");
        self.sender.send_replace(state);
    }

    pub fn current(&self) -> RuntimeState {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RuntimeState> {
        self.sender.subscribe()
    }
}
