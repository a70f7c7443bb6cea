// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static TEST_SUBSCRIBER: OnceCell<()> = OnceCell::new();

/// Install a `tracing` subscriber that writes through the test harness, filtered by `RUST_LOG`.
/// Safe to call from every test; only the first call has an effect.
pub fn init_for_testing() {
    TEST_SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // Another subscriber may already be installed by the embedding test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_for_testing();
        init_for_testing();
        tracing::info!("subscriber installed");
        assert!(TEST_SUBSCRIBER.get().is_some());
    }
}
