// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Where user-facing reports go. `message` is the short form shown to the user, `detail` the
/// longer diagnostic string.
pub trait OutputSink: Send + Sync {
    fn report(&self, severity: Severity, message: &str, detail: &str);
}

/// Forwards every report to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingOutputSink;

impl OutputSink for TracingOutputSink {
    fn report(&self, severity: Severity, message: &str, detail: &str) {
        match severity {
            Severity::Info | Severity::Success => info!(%severity, detail, "{message}"),
            Severity::Warning => warn!(detail, "{message}"),
            Severity::Error => error!(detail, "{message}"),
        }
    }
}
