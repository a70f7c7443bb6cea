// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Histogram, IntCounter, IntCounterVec, Registry,
};

const LATENCY_SEC_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1., 2.5, 5., 10., 20., 30., 60.,
];

/// Prometheus metrics which can be displayed in Grafana, queried and alerted on
#[derive(Clone)]
pub struct ExplorerMetrics {
    pub(crate) aggregation_passes: IntCounterVec,
    pub(crate) branch_errors: IntCounterVec,
    pub(crate) stale_passes_discarded: IntCounter,
    pub(crate) aggregation_latency: Histogram,
}

impl ExplorerMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            aggregation_passes: register_int_counter_vec_with_registry!(
                "fabric_explorer_aggregation_passes",
                "Total aggregation passes started, group by runtime",
                &["runtime"],
                registry,
            )
            .unwrap(),
            branch_errors: register_int_counter_vec_with_registry!(
                "fabric_explorer_branch_errors",
                "Total branch errors recorded while building snapshots, group by branch",
                &["branch"],
                registry,
            )
            .unwrap(),
            stale_passes_discarded: register_int_counter_with_registry!(
                "fabric_explorer_stale_passes_discarded",
                "Aggregation passes whose result was dropped because a newer pass superseded them",
                registry,
            )
            .unwrap(),
            aggregation_latency: register_histogram_with_registry!(
                "fabric_explorer_aggregation_latency",
                "Time taken to build one topology snapshot",
                LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_tests() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
