// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Collector registry and the concrete collector adapters.
//!
//! Collectors form a closed set dispatched through an enum rather than a
//! by-name lookup; registry construction is a straight match on the config
//! strings. Unknown names are skipped with a warning, never a failure, and a
//! collector error on one tick is logged and discarded so the other
//! collectors still report.

pub mod cpu;
pub mod disk;
pub mod host;
pub mod logs;
pub mod memory;
pub mod net;
pub mod process;

#[cfg(unix)]
pub mod container;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::Config;
use crate::model::{LogEntry, Metric, ProcessSnapshot};

/// The closed set of metric collectors.
pub enum MetricCollector {
    Cpu(cpu::CpuCollector),
    Mem(memory::MemoryCollector),
    Disk(disk::DiskCollector),
    Host(host::HostCollector),
    Net(net::NetCollector),
    #[cfg(unix)]
    Docker(container::ContainerCollector),
    #[cfg(unix)]
    Podman(container::ContainerCollector),
}

impl MetricCollector {
    pub fn name(&self) -> &'static str {
        match self {
            MetricCollector::Cpu(_) => "cpu",
            MetricCollector::Mem(_) => "mem",
            MetricCollector::Disk(_) => "disk",
            MetricCollector::Host(_) => "host",
            MetricCollector::Net(_) => "net",
            #[cfg(unix)]
            MetricCollector::Docker(_) => "docker",
            #[cfg(unix)]
            MetricCollector::Podman(_) => "podman",
        }
    }

    pub async fn collect(&mut self, cancel: &CancellationToken) -> anyhow::Result<Vec<Metric>> {
        match self {
            MetricCollector::Cpu(c) => c.collect(),
            MetricCollector::Mem(c) => c.collect(),
            MetricCollector::Disk(c) => c.collect(),
            MetricCollector::Host(c) => c.collect(),
            MetricCollector::Net(c) => c.collect(),
            #[cfg(unix)]
            MetricCollector::Docker(c) => c.collect(cancel).await,
            #[cfg(unix)]
            MetricCollector::Podman(c) => c.collect(cancel).await,
        }
    }
}

/// The closed set of log collectors.
pub enum LogCollector {
    #[cfg(unix)]
    Journald(logs::journald::JournaldCollector),
    #[cfg(windows)]
    EventViewer(logs::eventviewer::EventViewerCollector),
    Security(logs::security::SecurityCollector),
}

impl LogCollector {
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            LogCollector::Journald(_) => "journald",
            #[cfg(windows)]
            LogCollector::EventViewer(_) => "eventviewer",
            LogCollector::Security(_) => "security",
        }
    }

    pub async fn collect(
        &mut self,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Vec<LogEntry>>> {
        match self {
            #[cfg(unix)]
            LogCollector::Journald(c) => c.collect(cancel).await,
            #[cfg(windows)]
            LogCollector::EventViewer(c) => c.collect(cancel).await,
            LogCollector::Security(c) => c.collect(cancel).await,
        }
    }
}

/// The configured set of metric collectors.
pub struct MetricRegistry {
    collectors: Vec<MetricCollector>,
}

impl MetricRegistry {
    pub fn new(config: &Config) -> Self {
        let mut collectors = Vec::new();
        for name in &config.agent.metrics_enabled {
            match name.as_str() {
                "cpu" => collectors.push(MetricCollector::Cpu(cpu::CpuCollector::new())),
                "mem" => collectors.push(MetricCollector::Mem(memory::MemoryCollector::new())),
                "disk" => collectors.push(MetricCollector::Disk(disk::DiskCollector::new())),
                "host" => collectors.push(MetricCollector::Host(host::HostCollector::new())),
                "net" => collectors.push(MetricCollector::Net(net::NetCollector::new())),
                "docker" => {
                    #[cfg(unix)]
                    if let Some(c) =
                        container::ContainerCollector::from_config("docker", &config.docker)
                    {
                        collectors.push(MetricCollector::Docker(c));
                    }
                    #[cfg(not(unix))]
                    warn!("docker collector is not supported on this platform, skipping");
                }
                "podman" => {
                    #[cfg(unix)]
                    if let Some(c) =
                        container::ContainerCollector::from_config("podman", &config.podman)
                    {
                        collectors.push(MetricCollector::Podman(c));
                    }
                    #[cfg(not(unix))]
                    warn!("podman collector is not supported on this platform, skipping");
                }
                other => warn!(collector = other, "unknown metric collector, skipping"),
            }
        }
        MetricRegistry { collectors }
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run every registered collector, concatenating their output.
    /// Per-collector errors are logged and discarded.
    pub async fn collect(&mut self, cancel: &CancellationToken) -> Vec<Metric> {
        let mut all = Vec::new();
        for collector in &mut self.collectors {
            if cancel.is_cancelled() {
                break;
            }
            match collector.collect(cancel).await {
                Ok(metrics) => all.extend(metrics),
                Err(e) => {
                    error!(collector = collector.name(), error = %e, "metric collection failed")
                }
            }
        }
        all
    }
}

/// The configured set of log collectors.
pub struct LogRegistry {
    collectors: Vec<LogCollector>,
}

impl LogRegistry {
    pub fn new(config: &Config) -> Self {
        let mut collectors = Vec::new();
        let log_config = &config.agent.log_collection;
        for source in &log_config.sources {
            match source.as_str() {
                "journald" => {
                    #[cfg(unix)]
                    collectors.push(LogCollector::Journald(
                        logs::journald::JournaldCollector::new(log_config),
                    ));
                    #[cfg(not(unix))]
                    warn!("journald source is not supported on this platform, skipping");
                }
                "eventviewer" => {
                    #[cfg(windows)]
                    collectors.push(LogCollector::EventViewer(
                        logs::eventviewer::EventViewerCollector::new(log_config),
                    ));
                    #[cfg(not(windows))]
                    warn!("eventviewer source is not supported on this platform, skipping");
                }
                "security" => collectors.push(LogCollector::Security(
                    logs::security::SecurityCollector::new(log_config),
                )),
                other => warn!(source = other, "unknown log source, skipping"),
            }
        }
        LogRegistry { collectors }
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run every registered log collector; each may return several batches.
    pub async fn collect(&mut self, cancel: &CancellationToken) -> Vec<Vec<LogEntry>> {
        let mut all = Vec::new();
        for collector in &mut self.collectors {
            if cancel.is_cancelled() {
                break;
            }
            match collector.collect(cancel).await {
                Ok(batches) => all.extend(batches),
                Err(e) => {
                    error!(collector = collector.name(), error = %e, "log collection failed")
                }
            }
        }
        all
    }
}

/// Process snapshot collector; one per processes runner.
pub struct ProcessRegistry {
    collector: process::ProcessCollector,
}

impl ProcessRegistry {
    pub fn new(_config: &Config) -> Self {
        ProcessRegistry {
            collector: process::ProcessCollector::new(),
        }
    }

    pub async fn collect(&mut self, cancel: &CancellationToken) -> Option<ProcessSnapshot> {
        if cancel.is_cancelled() {
            return None;
        }
        match self.collector.collect() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(error = %e, "process collection failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_collector_names_are_skipped() {
        let mut config = Config::default();
        config.agent.metrics_enabled =
            vec!["cpu".into(), "flux-capacitor".into(), "mem".into()];
        let registry = MetricRegistry::new(&config);
        assert_eq!(registry.collectors.len(), 2);
        assert_eq!(registry.collectors[0].name(), "cpu");
        assert_eq!(registry.collectors[1].name(), "mem");
    }

    #[test]
    fn test_container_collectors_require_enabled_socket() {
        let mut config = Config::default();
        config.agent.metrics_enabled = vec!["docker".into(), "podman".into()];
        // Neither runtime block is enabled.
        let registry = MetricRegistry::new(&config);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_log_sources_are_skipped() {
        let mut config = Config::default();
        config.agent.log_collection.sources = vec!["security".into(), "syslog-ng".into()];
        let registry = LogRegistry::new(&config);
        assert_eq!(registry.collectors.len(), 1);
        assert_eq!(registry.collectors[0].name(), "security");
    }

    #[tokio::test]
    async fn test_collect_on_cancelled_token_returns_promptly() {
        let mut config = Config::default();
        config.agent.metrics_enabled = vec!["cpu".into(), "mem".into()];
        let mut registry = MetricRegistry::new(&config);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let metrics = registry.collect(&cancel).await;
        assert!(metrics.is_empty());
    }
}
