// Copyright (c) 2026 Veltaros
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Prometheus metrics for this node's concerns: connected
//! peers, bans, handshake failures, mempool size, chain height, and nonce
//! rejections. Registered once in [`Metrics::new`]; callers update the
//! gauges/counters from the peer manager, mempool, and chain without
//! holding any state lock while doing so.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric could not be constructed or registered with the registry.
    #[error("prometheus registration failed")]
    Prom,
}

/// Metrics container, cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    /// Registry every metric below is registered against.
    pub registry: Registry,

    /// Currently registered peers.
    pub peers_connected: IntGauge,
    /// Cumulative handshake failures (version/network-id mismatch,
    /// challenge mismatch, timeout).
    pub handshake_failures_total: IntCounter,
    /// Cumulative ban events installed by the scorer.
    pub peers_banned_total: IntCounter,
    /// Current mempool entry count.
    pub mempool_size: IntGauge,
    /// Current chain height.
    pub chain_height: IntGauge,
    /// Cumulative nonce rejections (`check_and_update` returning false).
    pub nonce_rejections_total: IntCounter,
}

impl Metrics {
    /// Create and register every metric against a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let peers_connected = IntGauge::new("veltaros_peers_connected", "Currently registered peers")
            .map_err(|_| MetricsError::Prom)?;
        let handshake_failures_total = IntCounter::new(
            "veltaros_handshake_failures_total",
            "Cumulative handshake failures",
        )
        .map_err(|_| MetricsError::Prom)?;
        let peers_banned_total = IntCounter::new("veltaros_peers_banned_total", "Cumulative ban events")
            .map_err(|_| MetricsError::Prom)?;
        let mempool_size = IntGauge::new("veltaros_mempool_size", "Current mempool entry count")
            .map_err(|_| MetricsError::Prom)?;
        let chain_height = IntGauge::new("veltaros_chain_height", "Current chain height")
            .map_err(|_| MetricsError::Prom)?;
        let nonce_rejections_total = IntCounter::new(
            "veltaros_nonce_rejections_total",
            "Cumulative nonce-too-low rejections",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry.register(Box::new(peers_connected.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(mempool_size.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(chain_height.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(handshake_failures_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(peers_banned_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(nonce_rejections_total.clone())).map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            peers_connected,
            handshake_failures_total,
            peers_banned_total,
            mempool_size,
            chain_height,
            nonce_rejections_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_name_collisions() {
        let m = Metrics::new().unwrap();
        assert_eq!(m.peers_connected.get(), 0);
        m.handshake_failures_total.inc();
        assert_eq!(m.handshake_failures_total.get(), 1);
        assert!(!m.registry.gather().is_empty());
    }
}
