// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use sysinfo::{DiskExt, System, SystemExt};

use crate::model::Metric;

/// Samples per-filesystem capacity and usage.
pub struct DiskCollector {
    sys: System,
}

impl DiskCollector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_disks_list();
        DiskCollector { sys }
    }

    pub fn collect(&mut self) -> anyhow::Result<Vec<Metric>> {
        self.sys.refresh_disks_list();
        self.sys.refresh_disks();

        let mut metrics = Vec::new();
        for disk in self.sys.disks() {
            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);
            let used_percent = if total > 0 {
                used as f64 / total as f64 * 100.0
            } else {
                0.0
            };

            let dims = [
                ("mountpoint", disk.mount_point().display().to_string()),
                ("device", disk.name().to_string_lossy().to_string()),
                (
                    "fstype",
                    String::from_utf8_lossy(disk.file_system()).to_string(),
                ),
            ];
            let with_dims = |mut metric: Metric| {
                for (k, v) in &dims {
                    metric = metric.with_dimension(k, v.clone());
                }
                metric
            };

            metrics.push(with_dims(Metric::gauge(
                "System",
                "Disk",
                "total_bytes",
                total as f64,
                "bytes",
            )));
            metrics.push(with_dims(Metric::gauge(
                "System",
                "Disk",
                "available_bytes",
                available as f64,
                "bytes",
            )));
            metrics.push(with_dims(Metric::gauge(
                "System",
                "Disk",
                "used_bytes",
                used as f64,
                "bytes",
            )));
            metrics.push(with_dims(Metric::gauge(
                "System",
                "Disk",
                "used_percent",
                used_percent,
                "percent",
            )));
        }
        Ok(metrics)
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        DiskCollector::new()
    }
}
