// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! The immutable identity and environment envelope attached to every payload.
//!
//! A [`Meta`] is built once at startup and shared by reference. Any overlay
//! (per-container identity, extra tags, standard labels) produces a fresh
//! clone; a published `Meta` is never mutated.

mod builder;
mod endpoint;

pub use builder::MetaBuilder;
pub use endpoint::endpoint_id;

use std::collections::HashMap;

use gosight_common::tag;

use crate::model::{LogMeta, Metric};

/// Whether the endpoint described by a meta is the host itself or one of its
/// containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetaKind {
    #[default]
    Host,
    Container,
}

impl MetaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKind::Host => "host",
            MetaKind::Container => "container",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    // Identity.
    pub agent_id: String,
    pub host_id: String,
    pub hostname: String,
    pub endpoint_id: String,
    pub agent_version: String,
    pub kind: MetaKind,

    // System facts.
    pub os: String,
    pub os_version: String,
    pub platform: String,
    pub platform_family: String,
    pub platform_version: String,
    pub kernel_version: String,
    pub kernel_architecture: String,
    pub architecture: String,
    pub virtualization_system: String,
    pub virtualization_role: String,

    // Cloud facts.
    pub cloud_provider: String,
    pub region: String,
    pub availability_zone: String,
    pub instance_id: String,
    pub instance_type: String,
    pub account_id: String,
    pub project_id: String,
    pub resource_group: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub image_id: String,
    pub service_id: String,

    // Container facts.
    pub container_id: String,
    pub container_name: String,
    pub container_image_id: String,
    pub container_image_name: String,
    pub pod_name: String,
    pub namespace: String,
    pub cluster_name: String,
    pub node_name: String,

    // Application facts.
    pub application: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub deployment_id: String,

    // Network facts.
    pub ip_address: String,
    pub public_ip: String,
    pub private_ip: String,
    pub mac_address: String,
    pub network_interface: String,

    pub tags: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

/// Fallback instance label for container metas with neither a name nor an id.
pub const UNKNOWN_CONTAINER: &str = "unknown-container";

/// Job label values for host and container payloads.
pub const JOB_AGENT: &str = "gosight-agent";
pub const JOB_CONTAINER: &str = "gosight-container";

impl Meta {
    /// Shallow copy with `extra` merged over the base tags. The base meta is
    /// left untouched.
    pub fn clone_with_tags(&self, extra: &HashMap<String, String>) -> Meta {
        let mut cloned = self.clone();
        cloned.tags = tag::merge(&self.tags, extra);
        cloned
    }

    /// Merge a log-local meta over this one: non-empty fields of `log_meta`
    /// win, and its extra map is merged into the tags with precedence.
    pub fn merge_with_base(&self, log_meta: &LogMeta) -> Meta {
        fn overlay(base: &str, over: &str) -> String {
            if over.is_empty() {
                base.to_string()
            } else {
                over.to_string()
            }
        }

        let mut merged = self.clone();
        merged.service = overlay(&self.service, &log_meta.service);
        merged.container_id = overlay(&self.container_id, &log_meta.container_id);
        merged.container_name = overlay(&self.container_name, &log_meta.container_name);
        merged.tags = tag::merge(&self.tags, &log_meta.extra);
        merged
    }

    /// Apply the standard label set for one payload, from one representative
    /// metric. Idempotent for the same inputs.
    pub fn apply_standard_labels(
        &mut self,
        metric: &Metric,
        is_container: bool,
        agent_start_unix: i64,
    ) {
        self.labels
            .insert("agent_start_time".into(), agent_start_unix.to_string());
        self.labels
            .insert("namespace".into(), metric.namespace.to_lowercase());
        self.labels
            .insert("subnamespace".into(), metric.sub_namespace.to_lowercase());

        if is_container {
            self.labels.insert("job".into(), JOB_CONTAINER.into());
            let instance = if !self.container_name.is_empty() {
                self.container_name.clone()
            } else if !self.container_id.is_empty() {
                self.container_id.clone()
            } else {
                UNKNOWN_CONTAINER.to_string()
            };
            self.labels.insert("instance".into(), instance);
        } else {
            self.labels.insert("job".into(), JOB_AGENT.into());
            self.labels.insert("instance".into(), self.hostname.clone());
        }
    }

    /// Recompute and store the endpoint id from the current identity fields.
    pub fn refresh_endpoint_id(&mut self) {
        self.endpoint_id = endpoint_id(self);
    }
}
