// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use sysinfo::{System, SystemExt};
use tracing::warn;

use crate::config::Config;
use gosight_common::tag;

use super::{Meta, MetaKind};

/// Value a probe degrades to when it fails; probing is never fatal.
const UNKNOWN: &str = "unknown";

/// Builds the base host [`Meta`] once at startup.
pub struct MetaBuilder;

impl MetaBuilder {
    /// Probe the host and assemble the base meta.
    ///
    /// Every probe is best-effort: a failure degrades that single field to
    /// `"unknown"` with a warning and never aborts startup. User-configured
    /// tags are merged first, then `extra_tags` (later wins).
    pub fn build(
        config: &Config,
        extra_tags: &HashMap<String, String>,
        agent_id: &str,
        agent_version: &str,
    ) -> Meta {
        let sys = System::new();

        let hostname = match &config.agent.host {
            Some(host) if !host.is_empty() => host.clone(),
            _ => sys.host_name().unwrap_or_else(|| {
                warn!("hostname probe failed");
                UNKNOWN.to_string()
            }),
        };

        let mut meta = Meta {
            agent_id: agent_id.to_string(),
            host_id: host_id(&hostname),
            hostname,
            agent_version: agent_version.to_string(),
            kind: MetaKind::Host,

            os: std::env::consts::OS.to_string(),
            os_version: sys
                .long_os_version()
                .or_else(|| sys.os_version())
                .unwrap_or_else(|| {
                    warn!("os version probe failed");
                    UNKNOWN.to_string()
                }),
            platform: {
                let id = sys.distribution_id();
                if id.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    id
                }
            },
            platform_family: std::env::consts::FAMILY.to_string(),
            platform_version: sys.os_version().unwrap_or_default(),
            kernel_version: sys.kernel_version().unwrap_or_else(|| {
                warn!("kernel version probe failed");
                UNKNOWN.to_string()
            }),
            kernel_architecture: std::env::consts::ARCH.to_string(),
            architecture: std::env::consts::ARCH.to_string(),

            environment: config.agent.environment.clone(),
            ip_address: primary_ipv4().unwrap_or_else(|| {
                warn!("primary ip probe failed");
                UNKNOWN.to_string()
            }),

            tags: tag::merge(&config.custom_tags, extra_tags),
            ..Default::default()
        };
        meta.private_ip = meta.ip_address.clone();
        meta.refresh_endpoint_id();
        meta
    }
}

/// A hostname-stable host identifier: the machine id where the OS exposes
/// one, otherwise the hostname itself.
fn host_id(hostname: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
            let id = id.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    hostname.to_string()
}

/// Primary local IPv4 via a connected (but never written) UDP socket; works
/// without sending a packet and picks the interface the default route uses.
fn primary_ipv4() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;
    if addr.ip().is_unspecified() {
        return None;
    }
    Some(addr.ip().to_string())
}
