// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

macro_rules! identifier_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

identifier_type!(
    /// Name of a peer as reported by the network.
    PeerRef
);
identifier_type!(
    /// Name of a channel joined by at least one peer.
    ChannelRef
);
identifier_type!(
    /// MSP identifier of an organization that is a member of a channel.
    OrganizationRef
);

/// A chaincode as reported by a channel: a name and the version currently instantiated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChaincodeRef {
    pub name: String,
    pub version: String,
}

impl ChaincodeRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Installed chaincode reported by one peer, keyed by name in the order the peer listed them.
pub type InstalledChaincodeMap = IndexMap<String, Vec<String>>;

/// An open session to a Fabric network.
///
/// Every query may fail on its own; a failure of one call says nothing about the others. Errors
/// must be normalized into a [`TransportError`] by the implementation before being returned.
#[async_trait]
pub trait ConnectionHandle: Send + Sync + 'static {
    /// All peers known to the connection.
    async fn list_peers(&self) -> Result<Vec<PeerRef>, TransportError>;

    /// Channels the given peer has joined.
    async fn list_channels(&self, peer: &PeerRef) -> Result<Vec<ChannelRef>, TransportError>;

    /// Chaincode installed on the given peer, name to versions.
    async fn list_installed_chaincode(
        &self,
        peer: &PeerRef,
    ) -> Result<InstalledChaincodeMap, TransportError>;

    /// Chaincode instantiated on the given channel.
    async fn list_instantiated_chaincode(
        &self,
        channel: &ChannelRef,
    ) -> Result<Vec<ChaincodeRef>, TransportError>;

    /// Organizations that are members of the given channel.
    async fn list_organizations(
        &self,
        channel: &ChannelRef,
    ) -> Result<Vec<OrganizationRef>, TransportError>;
}
