// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use sysinfo::{CpuExt, System, SystemExt};

use crate::model::Metric;

/// Samples CPU utilization and load averages.
///
/// The `System` is kept across ticks: sysinfo derives usage from the delta
/// between two refreshes, so the first tick reports zero and every later
/// tick reports the usage since the previous one.
pub struct CpuCollector {
    sys: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        CpuCollector { sys: System::new() }
    }

    pub fn collect(&mut self) -> anyhow::Result<Vec<Metric>> {
        self.sys.refresh_cpu();

        let mut metrics = Vec::new();
        metrics.push(Metric::gauge(
            "System",
            "CPU",
            "usage_percent",
            self.sys.global_cpu_info().cpu_usage() as f64,
            "percent",
        ));
        metrics.push(Metric::gauge(
            "System",
            "CPU",
            "count",
            self.sys.cpus().len() as f64,
            "count",
        ));

        for (index, cpu) in self.sys.cpus().iter().enumerate() {
            metrics.push(
                Metric::gauge(
                    "System",
                    "CPU",
                    "core_usage_percent",
                    cpu.cpu_usage() as f64,
                    "percent",
                )
                .with_dimension("core", index.to_string()),
            );
        }

        let load = self.sys.load_average();
        metrics.push(Metric::gauge("System", "CPU", "load_avg_1", load.one, ""));
        metrics.push(Metric::gauge("System", "CPU", "load_avg_5", load.five, ""));
        metrics.push(Metric::gauge(
            "System",
            "CPU",
            "load_avg_15",
            load.fifteen,
            "",
        ));

        Ok(metrics)
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        CpuCollector::new()
    }
}
