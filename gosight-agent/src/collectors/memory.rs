// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use sysinfo::{System, SystemExt};

use crate::model::Metric;

/// Samples memory and swap usage.
pub struct MemoryCollector {
    sys: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        MemoryCollector { sys: System::new() }
    }

    pub fn collect(&mut self) -> anyhow::Result<Vec<Metric>> {
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        let used = self.sys.used_memory();
        let used_percent = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Ok(vec![
            Metric::gauge("System", "Memory", "total_bytes", total as f64, "bytes"),
            Metric::gauge("System", "Memory", "used_bytes", used as f64, "bytes"),
            Metric::gauge(
                "System",
                "Memory",
                "available_bytes",
                self.sys.available_memory() as f64,
                "bytes",
            ),
            Metric::gauge("System", "Memory", "used_percent", used_percent, "percent"),
            Metric::gauge(
                "System",
                "Memory",
                "swap_total_bytes",
                self.sys.total_swap() as f64,
                "bytes",
            ),
            Metric::gauge(
                "System",
                "Memory",
                "swap_used_bytes",
                self.sys.used_swap() as f64,
                "bytes",
            ),
        ])
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        MemoryCollector::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reports_consistent_values() {
        let mut collector = MemoryCollector::new();
        let metrics = collector.collect().unwrap();

        let get = |name: &str| {
            metrics
                .iter()
                .find(|m| m.name == name)
                .unwrap_or_else(|| panic!("missing {name}"))
                .value
        };

        assert!(get("total_bytes") > 0.0);
        assert!(get("used_bytes") <= get("total_bytes"));
        let used_percent = get("used_percent");
        assert!((0.0..=100.0).contains(&used_percent));
    }
}
