// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{ChannelRef, PeerRef};

pub type ExplorerResult<T = ()> = Result<T, ExplorerError>;

const DEFAULT_ERROR_NAME: &str = "Error";
const MALFORMED_RESPONSE_NAME: &str = "MalformedResponse";

pub const CONTROL_PANEL_PREFIX: &str = "Error populating Local Fabric Control Panel";
const NODES_VIEW_PREFIX: &str = "Error populating nodes view";
const CHANNEL_VIEW_PREFIX: &str = "Error populating channel view";
const INSTALLED_VIEW_PREFIX: &str = "Error populating installed smart contracts view";
const INSTANTIATED_VIEW_PREFIX: &str = "Error populating instantiated smart contracts view";
const ORGANIZATIONS_VIEW_PREFIX: &str = "Error populating organizations view";

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Failed to connect to runtime {runtime}: {source}")]
    Connection {
        runtime: String,
        #[source]
        source: TransportError,
    },
    #[error("Invalid explorer configuration: {0}")]
    InvalidConfig(String),
}

/// A failure reported by the connection layer.
///
/// Collaborators report failures in loose shapes: sometimes with a message, sometimes with only an
/// error name, sometimes with a transport status code. Everything is normalized into this value at
/// the boundary so the aggregation logic never has to look at the original shape.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct TransportError {
    name: String,
    message: Option<String>,
    status: Option<u32>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_ERROR_NAME.to_owned(),
            message: Some(message.into()).filter(|m| !m.is_empty()),
            status: None,
        }
    }

    /// A failure that carries a name but no message.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
            status: None,
        }
    }

    /// The collaborator answered, but with data that does not have the expected shape.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(message).with_name(MALFORMED_RESPONSE_NAME)
    }

    /// Normalize any error value, keeping its rendered text as the message.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.name = name;
        }
        self
    }

    pub fn with_status(mut self, status: u32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn status(&self) -> Option<u32> {
        self.status
    }

    pub fn is_malformed(&self) -> bool {
        self.name == MALFORMED_RESPONSE_NAME
    }

    /// The message, or the error name when there is none.
    pub fn message_or_name(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.name)
    }

    /// The message, or the rendered form when there is none.
    pub fn message_or_rendered(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.rendered(),
        }
    }

    /// The long diagnostic form, `<name>: <message>`.
    pub fn rendered(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {}", self.name, message),
            None if self.name == DEFAULT_ERROR_NAME => self.name.clone(),
            None => format!("{}: {}", DEFAULT_ERROR_NAME, self.name),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered())
    }
}

impl From<&str> for TransportError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for TransportError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Decides whether a fault means the transport refused the connection outright.
pub trait FaultClassifier: Send + Sync {
    fn is_unavailable(&self, fault: &TransportError) -> bool;
}

/// Classifies a fault as a transport denial when it carries one of the configured status codes,
/// or when its message contains one of the configured fragments.
#[derive(Clone, Debug)]
pub struct StatusPatternClassifier {
    patterns: Vec<String>,
    status_codes: Vec<u32>,
}

impl StatusPatternClassifier {
    pub fn new(patterns: Vec<String>, status_codes: Vec<u32>) -> Self {
        Self {
            patterns,
            status_codes,
        }
    }
}

impl Default for StatusPatternClassifier {
    fn default() -> Self {
        Self::new(
            crate::config::default_unavailable_patterns(),
            crate::config::default_unavailable_status_codes(),
        )
    }
}

impl FaultClassifier for StatusPatternClassifier {
    fn is_unavailable(&self, fault: &TransportError) -> bool {
        if fault
            .status()
            .is_some_and(|status| self.status_codes.contains(&status))
        {
            return true;
        }
        fault.message().is_some_and(|message| {
            self.patterns
                .iter()
                .any(|pattern| message.contains(pattern.as_str()))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BranchKind {
    Peers,
    Channels,
    InstalledChaincode,
    InstantiatedChaincode,
    Organizations,
}

impl BranchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::Peers => "peers",
            BranchKind::Channels => "channels",
            BranchKind::InstalledChaincode => "installed_chaincode",
            BranchKind::InstantiatedChaincode => "instantiated_chaincode",
            BranchKind::Organizations => "organizations",
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The key whose query failed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BranchScope {
    Network,
    Peer(PeerRef),
    Channel(ChannelRef),
}

/// A failure isolated to one branch of the view, with the short message shown to the user and the
/// long form kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchError {
    pub kind: BranchKind,
    pub scope: BranchScope,
    pub message: String,
    pub detail: String,
}

impl BranchError {
    fn new(
        kind: BranchKind,
        scope: BranchScope,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            scope,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn peers(fault: &TransportError) -> Self {
        Self::new(
            BranchKind::Peers,
            BranchScope::Network,
            format!("{NODES_VIEW_PREFIX}: {}", fault.message_or_rendered()),
            format!("{NODES_VIEW_PREFIX}: {}", fault.rendered()),
        )
    }

    /// A peer failed to list its channels. Every branch derived from the channel map gets its own
    /// error, each worded for the view it belongs to.
    pub fn channel_map(
        peer: &PeerRef,
        fault: &TransportError,
        classifier: &dyn FaultClassifier,
    ) -> [Self; 3] {
        let inner = if classifier.is_unavailable(fault) {
            format!("Cannot connect to Fabric: {}", fault.message_or_name())
        } else {
            format!("Error creating channel map: {}", fault.message_or_name())
        };
        let scope = BranchScope::Peer(peer.clone());
        [
            Self::new(
                BranchKind::Channels,
                scope.clone(),
                format!("{CHANNEL_VIEW_PREFIX}: {inner}"),
                format!("{CHANNEL_VIEW_PREFIX}: {DEFAULT_ERROR_NAME}: {inner}"),
            ),
            Self::new(
                BranchKind::InstantiatedChaincode,
                scope.clone(),
                format!("{INSTANTIATED_VIEW_PREFIX}: {inner}"),
                format!("{INSTANTIATED_VIEW_PREFIX}: {inner}"),
            ),
            Self::new(
                BranchKind::Organizations,
                scope,
                format!("{ORGANIZATIONS_VIEW_PREFIX}: {}", fault.message_or_name()),
                format!("{ORGANIZATIONS_VIEW_PREFIX}: {}", fault.rendered()),
            ),
        ]
    }

    pub fn installed_chaincode(peer: &PeerRef, fault: &TransportError) -> Self {
        let message = format!("{INSTALLED_VIEW_PREFIX}: {}", fault.message_or_name());
        Self::new(
            BranchKind::InstalledChaincode,
            BranchScope::Peer(peer.clone()),
            message.clone(),
            message,
        )
    }

    pub fn instantiated_chaincode(channel: &ChannelRef, fault: &TransportError) -> Self {
        let message = format!("{INSTANTIATED_VIEW_PREFIX}: {}", fault.message_or_name());
        Self::new(
            BranchKind::InstantiatedChaincode,
            BranchScope::Channel(channel.clone()),
            message.clone(),
            message,
        )
    }

    pub fn organizations(channel: &ChannelRef, fault: &TransportError) -> Self {
        Self::new(
            BranchKind::Organizations,
            BranchScope::Channel(channel.clone()),
            format!("{ORGANIZATIONS_VIEW_PREFIX}: {}", fault.message_or_name()),
            format!("{ORGANIZATIONS_VIEW_PREFIX}: {}", fault.rendered()),
        )
    }
}
