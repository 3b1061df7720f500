// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Container runtime metrics over the docker-compatible REST API.
//!
//! Docker and Podman both expose the same surface on a UNIX socket, so one
//! collector serves both; only the socket path and the `sub_namespace`
//! differ. The probe is a plain HTTP/1 GET over `tokio::net::UnixStream`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RuntimeSocketConfig;
use crate::model::{Metric, CONTAINER_ID_DIMENSION};

/// Per-request budget for the local daemon; the socket is local so anything
/// slower than this means the daemon is wedged.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "ImageID", default)]
    image_id: String,
    #[serde(rename = "State", default)]
    state: String,
}

#[derive(Debug, Default, Deserialize)]
struct CpuUsage {
    #[serde(rename = "total_usage", default)]
    total_usage: u64,
}

#[derive(Debug, Default, Deserialize)]
struct CpuStats {
    #[serde(rename = "cpu_usage", default)]
    cpu_usage: CpuUsage,
    #[serde(rename = "system_cpu_usage", default)]
    system_cpu_usage: u64,
    #[serde(rename = "online_cpus", default)]
    online_cpus: u32,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryStats {
    #[serde(default)]
    usage: u64,
    #[serde(default)]
    limit: u64,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkStats {
    #[serde(default)]
    rx_bytes: u64,
    #[serde(default)]
    tx_bytes: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerStats {
    #[serde(rename = "cpu_stats", default)]
    cpu_stats: CpuStats,
    #[serde(rename = "precpu_stats", default)]
    precpu_stats: CpuStats,
    #[serde(rename = "memory_stats", default)]
    memory_stats: MemoryStats,
    #[serde(default)]
    networks: HashMap<String, NetworkStats>,
}

impl ContainerStats {
    /// CPU percentage the way `docker stats` computes it: usage delta over
    /// system delta, scaled by the number of online CPUs.
    fn cpu_percent(&self) -> f64 {
        let cpu_delta = self
            .cpu_stats
            .cpu_usage
            .total_usage
            .saturating_sub(self.precpu_stats.cpu_usage.total_usage) as f64;
        let system_delta = self
            .cpu_stats
            .system_cpu_usage
            .saturating_sub(self.precpu_stats.system_cpu_usage) as f64;
        if system_delta <= 0.0 || cpu_delta < 0.0 {
            return 0.0;
        }
        let cpus = self.cpu_stats.online_cpus.max(1) as f64;
        cpu_delta / system_delta * cpus * 100.0
    }
}

/// Samples one container runtime (docker or podman) over its UNIX socket.
pub struct ContainerCollector {
    runtime: &'static str,
    socket: PathBuf,
}

impl ContainerCollector {
    /// Build from a runtime config block; returns `None` (with a warning)
    /// when the block is disabled or has no socket.
    pub fn from_config(runtime: &'static str, config: &RuntimeSocketConfig) -> Option<Self> {
        if !config.enabled {
            warn!(runtime, "container collector configured but not enabled, skipping");
            return None;
        }
        let socket = match &config.socket {
            Some(socket) if !socket.is_empty() => PathBuf::from(socket),
            _ => {
                warn!(runtime, "container collector enabled without a socket, skipping");
                return None;
            }
        };
        Some(ContainerCollector { runtime, socket })
    }

    pub async fn collect(&mut self, cancel: &CancellationToken) -> anyhow::Result<Vec<Metric>> {
        let sub_namespace = match self.runtime {
            "podman" => "Podman",
            _ => "Docker",
        };

        let containers: Vec<ContainerSummary> =
            get_json(&self.socket, "/containers/json?all=true").await?;
        debug!(
            runtime = self.runtime,
            containers = containers.len(),
            "listed containers"
        );

        let mut metrics = Vec::new();
        for container in containers {
            if cancel.is_cancelled() {
                break;
            }
            let running = container.state.eq_ignore_ascii_case("running");
            let name = container
                .names
                .first()
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default();

            let dims = [
                (CONTAINER_ID_DIMENSION, container.id.clone()),
                ("name", name),
                ("image", container.image.clone()),
                ("image_id", container.image_id.clone()),
            ];
            let with_dims = |mut metric: Metric| {
                for (k, v) in &dims {
                    metric = metric.with_dimension(k, v.clone());
                }
                metric
            };

            metrics.push(with_dims(Metric::gauge(
                "Container",
                sub_namespace,
                "running",
                if running { 1.0 } else { 0.0 },
                "",
            )));

            if !running {
                continue;
            }

            let path = format!("/containers/{}/stats?stream=false", container.id);
            let stats: ContainerStats = match get_json(&self.socket, &path).await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(runtime = self.runtime, container = %container.id, error = %e,
                        "container stats probe failed");
                    continue;
                }
            };

            metrics.push(with_dims(Metric::gauge(
                "Container",
                sub_namespace,
                "cpu_percent",
                stats.cpu_percent(),
                "percent",
            )));
            metrics.push(with_dims(Metric::gauge(
                "Container",
                sub_namespace,
                "mem_usage_bytes",
                stats.memory_stats.usage as f64,
                "bytes",
            )));
            metrics.push(with_dims(Metric::gauge(
                "Container",
                sub_namespace,
                "mem_limit_bytes",
                stats.memory_stats.limit as f64,
                "bytes",
            )));

            let (rx, tx) = stats
                .networks
                .values()
                .fold((0u64, 0u64), |(rx, tx), network| {
                    (rx + network.rx_bytes, tx + network.tx_bytes)
                });
            metrics.push(with_dims(Metric::counter(
                "Container",
                sub_namespace,
                "net_rx_bytes",
                rx as f64,
                "bytes",
            )));
            metrics.push(with_dims(Metric::counter(
                "Container",
                sub_namespace,
                "net_tx_bytes",
                tx as f64,
                "bytes",
            )));
        }
        Ok(metrics)
    }
}

/// One GET against the daemon socket, decoded as JSON.
async fn get_json<T: DeserializeOwned>(socket: &Path, path: &str) -> anyhow::Result<T> {
    let body = tokio::time::timeout(REQUEST_TIMEOUT, get(socket, path))
        .await
        .map_err(|_| anyhow::anyhow!("request to {} timed out", socket.display()))??;
    Ok(serde_json::from_slice(&body)?)
}

async fn get(socket: &Path, path: &str) -> anyhow::Result<Bytes> {
    let stream = UnixStream::connect(socket).await?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        // The connection future drives IO; it ends with the request.
        let _ = conn.await;
    });

    let request = http::Request::builder()
        .method(http::Method::GET)
        .uri(path)
        .header(http::header::HOST, "localhost")
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    anyhow::ensure!(
        response.status().is_success(),
        "daemon returned {}",
        response.status()
    );
    Ok(response.into_body().collect().await?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_percent_computation() {
        let stats = ContainerStats {
            cpu_stats: CpuStats {
                cpu_usage: CpuUsage { total_usage: 400 },
                system_cpu_usage: 2000,
                online_cpus: 2,
            },
            precpu_stats: CpuStats {
                cpu_usage: CpuUsage { total_usage: 200 },
                system_cpu_usage: 1000,
                online_cpus: 2,
            },
            ..Default::default()
        };
        // (200 / 1000) * 2 cpus * 100 = 40%
        assert!((stats.cpu_percent() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cpu_percent_zero_system_delta() {
        let stats = ContainerStats::default();
        assert_eq!(stats.cpu_percent(), 0.0);
    }

    #[test]
    fn test_from_config_gating() {
        let disabled = RuntimeSocketConfig {
            socket: Some("/run/docker.sock".into()),
            enabled: false,
        };
        assert!(ContainerCollector::from_config("docker", &disabled).is_none());

        let no_socket = RuntimeSocketConfig {
            socket: None,
            enabled: true,
        };
        assert!(ContainerCollector::from_config("docker", &no_socket).is_none());

        let ok = RuntimeSocketConfig {
            socket: Some("/run/docker.sock".into()),
            enabled: true,
        };
        assert!(ContainerCollector::from_config("docker", &ok).is_some());
    }

    #[test]
    fn test_container_summary_parsing() {
        let json = r#"[{"Id":"abc123","Names":["/nginx"],"Image":"nginx:latest",
            "ImageID":"sha256:deadbeef","State":"running"}]"#;
        let containers: Vec<ContainerSummary> = serde_json::from_str(json).unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "abc123");
        assert_eq!(containers[0].names[0], "/nginx");
        assert_eq!(containers[0].state, "running");
    }

    #[test]
    fn test_stats_parsing_tolerates_missing_fields() {
        let stats: ContainerStats = serde_json::from_str("{}").unwrap();
        assert_eq!(stats.memory_stats.usage, 0);
        assert_eq!(stats.cpu_percent(), 0.0);
    }
}
