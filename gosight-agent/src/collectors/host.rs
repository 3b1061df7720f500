// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use sysinfo::{System, SystemExt};

use crate::model::Metric;

/// Samples host facts: uptime, boot time and logged-in user count.
///
/// The descriptive facts (OS, kernel) live in the meta envelope; this
/// collector only reports the values that change over time, with the OS
/// name attached as a dimension for convenience.
pub struct HostCollector {
    sys: System,
}

impl HostCollector {
    pub fn new() -> Self {
        HostCollector { sys: System::new() }
    }

    pub fn collect(&mut self) -> anyhow::Result<Vec<Metric>> {
        self.sys.refresh_users_list();

        let os = self
            .sys
            .name()
            .unwrap_or_else(|| std::env::consts::OS.to_string());

        Ok(vec![
            Metric::gauge(
                "System",
                "Host",
                "uptime_seconds",
                self.sys.uptime() as f64,
                "seconds",
            )
            .with_dimension("os", os),
            Metric::gauge(
                "System",
                "Host",
                "boot_time_unix",
                self.sys.boot_time() as f64,
                "seconds",
            ),
            Metric::gauge(
                "System",
                "Host",
                "users",
                self.sys.users().len() as f64,
                "count",
            ),
        ])
    }
}

impl Default for HostCollector {
    fn default() -> Self {
        HostCollector::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reports_uptime() {
        let mut collector = HostCollector::new();
        let metrics = collector.collect().unwrap();
        let uptime = metrics.iter().find(|m| m.name == "uptime_seconds").unwrap();
        assert!(uptime.value >= 0.0);
        assert!(uptime.dimensions.contains_key("os"));
    }
}
