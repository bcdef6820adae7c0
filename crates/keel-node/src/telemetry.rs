//! Prometheus chain metrics.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] (prefix `keel`)
//! so they do not collide with the default global registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use keel_core::traits::ChainTelemetry;

use crate::error::NodeError;

/// Metric handles for the chain state. Cheap to clone.
#[derive(Clone)]
pub struct ChainMetrics {
    registry: Registry,
    /// Height of the canonical tail.
    pub block_height: IntGauge,
    /// Fingerprint of the hash six blocks below the tail.
    pub blocktail_hash: IntGauge,
    /// Blocks reverted by the most recent reorganization.
    pub block_revert_count: IntGauge,
    /// Reorganizations observed since start.
    pub block_revert_total: IntCounter,
}

impl ChainMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new_custom(Some("keel".into()), None)?;

        let block_height = IntGauge::new("block_height", "Height of the canonical tail block")?;
        registry.register(Box::new(block_height.clone()))?;

        let blocktail_hash = IntGauge::new(
            "blocktail_hash",
            "Numeric fingerprint of the block six below the tail",
        )?;
        registry.register(Box::new(blocktail_hash.clone()))?;

        let block_revert_count = IntGauge::new(
            "block_revert_count",
            "Blocks reverted by the most recent reorganization",
        )?;
        registry.register(Box::new(block_revert_count.clone()))?;

        let block_revert_total =
            IntCounter::new("block_revert_total", "Chain reorganizations observed")?;
        registry.register(Box::new(block_revert_total.clone()))?;

        Ok(Self {
            registry,
            block_height,
            blocktail_hash,
            block_revert_count,
            block_revert_total,
        })
    }

    /// Encode all registered metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| NodeError::Config(e.to_string()))
    }
}

impl ChainTelemetry for ChainMetrics {
    fn head_changed(&self, height: u64, fingerprint: i64) {
        self.block_height.set(i64::try_from(height).unwrap_or(i64::MAX));
        self.blocktail_hash.set(fingerprint);
    }

    fn reorg(&self, reverted: u64) {
        self.block_revert_count
            .set(i64::try_from(reverted).unwrap_or(i64::MAX));
        self.block_revert_total.inc();
    }
}
