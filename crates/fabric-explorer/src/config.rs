// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ExplorerError, ExplorerResult, StatusPatternClassifier};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ExplorerConfig {
    /// Name of the runtime the explorer is attached to. Used in logs and metric labels.
    #[serde(default = "default_runtime_name")]
    pub runtime_name: String,
    /// Upper bound on the number of collaborator queries in flight at once within one stage of an
    /// aggregation pass.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    /// Message fragments that mark a fault as the transport refusing the connection.
    #[serde(default = "default_unavailable_patterns")]
    pub unavailable_patterns: Vec<String>,
    /// Status codes that mark a fault as the transport refusing the connection.
    #[serde(default = "default_unavailable_status_codes")]
    pub unavailable_status_codes: Vec<u32>,
}

fn default_runtime_name() -> String {
    "local_fabric".to_owned()
}

fn default_max_concurrent_queries() -> usize {
    16
}

pub(crate) fn default_unavailable_patterns() -> Vec<String> {
    vec!["Received http2 header with status: 503".to_owned()]
}

// gRPC UNAVAILABLE and HTTP 503.
pub(crate) fn default_unavailable_status_codes() -> Vec<u32> {
    vec![14, 503]
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            runtime_name: default_runtime_name(),
            max_concurrent_queries: default_max_concurrent_queries(),
            unavailable_patterns: default_unavailable_patterns(),
            unavailable_status_codes: default_unavailable_status_codes(),
        }
    }
}

impl ExplorerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        trace!("Reading config from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Unable to read explorer config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Unable to parse explorer config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        trace!("Writing config to {:?}", path);
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Unable to write explorer config to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> ExplorerResult {
        if self.max_concurrent_queries == 0 {
            return Err(ExplorerError::InvalidConfig(
                "max-concurrent-queries must be at least 1".to_owned(),
            ));
        }
        if self.runtime_name.is_empty() {
            return Err(ExplorerError::InvalidConfig(
                "runtime-name must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn fault_classifier(&self) -> StatusPatternClassifier {
        StatusPatternClassifier::new(
            self.unavailable_patterns.clone(),
            self.unavailable_status_codes.clone(),
        )
    }
}
