// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use sysinfo::{NetworkExt, NetworksExt, System, SystemExt};

use crate::model::Metric;

/// Samples per-interface traffic counters.
pub struct NetCollector {
    sys: System,
}

impl NetCollector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_networks_list();
        NetCollector { sys }
    }

    pub fn collect(&mut self) -> anyhow::Result<Vec<Metric>> {
        self.sys.refresh_networks_list();
        self.sys.refresh_networks();

        let mut metrics = Vec::new();
        for (interface, data) in self.sys.networks().iter() {
            let series = [
                ("rx_bytes_total", data.total_received() as f64, "bytes"),
                ("tx_bytes_total", data.total_transmitted() as f64, "bytes"),
                (
                    "rx_packets_total",
                    data.total_packets_received() as f64,
                    "count",
                ),
                (
                    "tx_packets_total",
                    data.total_packets_transmitted() as f64,
                    "count",
                ),
                (
                    "rx_errors_total",
                    data.total_errors_on_received() as f64,
                    "count",
                ),
                (
                    "tx_errors_total",
                    data.total_errors_on_transmitted() as f64,
                    "count",
                ),
            ];
            for (name, value, unit) in series {
                metrics.push(
                    Metric::counter("System", "Network", name, value, unit)
                        .with_dimension("interface", interface.clone()),
                );
            }
        }
        Ok(metrics)
    }
}

impl Default for NetCollector {
    fn default() -> Self {
        NetCollector::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKind;

    #[test]
    fn test_collect_counters_per_interface() {
        let mut collector = NetCollector::new();
        let metrics = collector.collect().unwrap();
        for metric in &metrics {
            assert_eq!(metric.kind, MetricKind::Counter);
            assert!(metric.dimensions.contains_key("interface"));
        }
        // Six series per interface.
        assert_eq!(metrics.len() % 6, 0);
    }
}
