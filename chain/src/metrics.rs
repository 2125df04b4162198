//! Prometheus-backed node metrics.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed node metrics. The node binary
//! serves [`MetricsRegistry::gather_text`] from its own router under
//! `/metrics`.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Node-level Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the mining
/// loop and the request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Blocks this node has mined itself.
    pub blocks_mined: IntCounter,
    /// Longer peer chains adopted in place of the local one.
    pub chains_adopted: IntCounter,
    /// Transactions accepted via `pushtx`.
    pub transactions_received: IntCounter,
    /// Wall-clock time of one proof-of-work round, in seconds.
    pub mine_seconds: Histogram,
    /// Wall-clock time of the sync half of an iteration, in seconds.
    pub sync_seconds: Histogram,
}

impl NodeMetrics {
    /// Registers node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_mined = IntCounter::with_opts(Opts::new(
            "blocks_mined_total",
            "Total number of blocks mined by this node",
        ))?;
        registry.register(Box::new(blocks_mined.clone()))?;

        let chains_adopted = IntCounter::with_opts(Opts::new(
            "chains_adopted_total",
            "Total number of longer peer chains adopted",
        ))?;
        registry.register(Box::new(chains_adopted.clone()))?;

        let transactions_received = IntCounter::with_opts(Opts::new(
            "transactions_received_total",
            "Total number of transactions accepted via pushtx",
        ))?;
        registry.register(Box::new(transactions_received.clone()))?;

        let mine_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "mine_round_seconds",
                "Duration of one proof-of-work round in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(mine_seconds.clone()))?;

        let sync_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "sync_iteration_seconds",
                "Duration of the peer-sync half of a mining iteration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(sync_seconds.clone()))?;

        Ok(Self {
            blocks_mined,
            chains_adopted,
            transactions_received,
            mine_seconds,
            sync_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the node metrics.
///
/// This is the main handle passed around the node. It can be wrapped in
/// an `Arc` and shared across threads and tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying
    /// `Registry` and registers the node metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("node".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

    /// Encodes all metrics in this registry into the Prometheus text
    /// format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = NodeMetrics::register(&registry).expect("register metrics");

        metrics.blocks_mined.inc();
        metrics.chains_adopted.inc();
        metrics.transactions_received.inc();
        metrics.mine_seconds.observe(1.5);
        metrics.sync_seconds.observe(0.05);

        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.node.blocks_mined.inc();
        let text = registry.gather_text();
        assert!(text.contains("blocks_mined_total"));
    }
}
