// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Domain-to-wire conversion for the stream frames.

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;

use gosight_protocol::pb;

use crate::meta::Meta;
use crate::model::{Metric, MetricPayload, ProcessInfo, ProcessPayload, TracePayload};

pub fn unix_nanos(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

pub fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn meta(meta: &Meta) -> pb::Meta {
    pb::Meta {
        agent_id: meta.agent_id.clone(),
        host_id: meta.host_id.clone(),
        hostname: meta.hostname.clone(),
        endpoint_id: meta.endpoint_id.clone(),
        agent_version: meta.agent_version.clone(),
        kind: meta.kind.as_str().to_string(),

        os: meta.os.clone(),
        os_version: meta.os_version.clone(),
        platform: meta.platform.clone(),
        platform_family: meta.platform_family.clone(),
        platform_version: meta.platform_version.clone(),
        kernel_version: meta.kernel_version.clone(),
        kernel_architecture: meta.kernel_architecture.clone(),
        architecture: meta.architecture.clone(),
        virtualization_system: meta.virtualization_system.clone(),
        virtualization_role: meta.virtualization_role.clone(),

        cloud_provider: meta.cloud_provider.clone(),
        region: meta.region.clone(),
        availability_zone: meta.availability_zone.clone(),
        instance_id: meta.instance_id.clone(),
        instance_type: meta.instance_type.clone(),
        account_id: meta.account_id.clone(),
        project_id: meta.project_id.clone(),
        resource_group: meta.resource_group.clone(),
        vpc_id: meta.vpc_id.clone(),
        subnet_id: meta.subnet_id.clone(),
        image_id: meta.image_id.clone(),
        service_id: meta.service_id.clone(),

        container_id: meta.container_id.clone(),
        container_name: meta.container_name.clone(),
        container_image_id: meta.container_image_id.clone(),
        container_image_name: meta.container_image_name.clone(),
        pod_name: meta.pod_name.clone(),
        namespace: meta.namespace.clone(),
        cluster_name: meta.cluster_name.clone(),
        node_name: meta.node_name.clone(),

        application: meta.application.clone(),
        service: meta.service.clone(),
        version: meta.version.clone(),
        environment: meta.environment.clone(),
        deployment_id: meta.deployment_id.clone(),

        ip_address: meta.ip_address.clone(),
        public_ip: meta.public_ip.clone(),
        private_ip: meta.private_ip.clone(),
        mac_address: meta.mac_address.clone(),
        network_interface: meta.network_interface.clone(),

        tags: meta.tags.clone().into_iter().collect(),
        labels: meta.labels.clone().into_iter().collect(),
    }
}

fn metric(metric: &Metric) -> pb::Metric {
    pb::Metric {
        namespace: metric.namespace.clone(),
        sub_namespace: metric.sub_namespace.clone(),
        name: metric.name.clone(),
        timestamp_unix_nano: unix_nanos(metric.timestamp),
        unit: metric.unit.clone(),
        r#type: metric.kind.as_str().to_string(),
        value: metric.value,
        data_points: metric
            .data_points
            .iter()
            .map(|point| pb::DataPoint {
                timestamp_unix_nano: point.timestamp.map(unix_nanos).unwrap_or(0),
                value: point.value,
                attributes: point.attributes.clone().into_iter().collect(),
            })
            .collect(),
        dimensions: metric.dimensions.clone().into_iter().collect(),
        statistic_values: metric.statistic_values.map(|stats| pb::StatisticValues {
            minimum: stats.minimum,
            maximum: stats.maximum,
            sample_count: stats.sample_count,
            sum: stats.sum,
        }),
    }
}

pub fn metric_payload(payload: &MetricPayload) -> pb::MetricPayload {
    pb::MetricPayload {
        agent_id: payload.identity.agent_id.clone(),
        host_id: payload.identity.host_id.clone(),
        hostname: payload.identity.hostname.clone(),
        endpoint_id: payload.identity.endpoint_id.clone(),
        timestamp_unix_nano: unix_nanos(payload.identity.timestamp),
        metrics: payload.metrics.iter().map(metric).collect(),
        meta: Some(meta(&payload.meta)),
    }
}

fn process(info: &ProcessInfo) -> pb::ProcessInfo {
    pb::ProcessInfo {
        pid: info.pid,
        ppid: info.ppid,
        user: info.user.clone(),
        executable: info.executable.clone(),
        cmdline: info.cmdline.clone(),
        cpu_percent: info.cpu_percent,
        mem_percent: info.mem_percent,
        threads: info.threads,
        start_time_unix: info.start_time.map(unix_seconds).unwrap_or(0),
        tags: info.tags.clone().into_iter().collect(),
    }
}

pub fn process_payload(payload: &ProcessPayload) -> pb::ProcessPayload {
    pb::ProcessPayload {
        agent_id: payload.identity.agent_id.clone(),
        host_id: payload.identity.host_id.clone(),
        hostname: payload.identity.hostname.clone(),
        endpoint_id: payload.identity.endpoint_id.clone(),
        timestamp_unix_nano: unix_nanos(payload.identity.timestamp),
        processes: payload.snapshot.processes.iter().map(process).collect(),
        meta: Some(meta(&payload.meta)),
    }
}

/// Frame one metric payload for the stream.
pub fn metric_frame(payload: &MetricPayload) -> pb::StreamPayload {
    pb::StreamPayload {
        payload: Some(pb::stream_payload::Payload::Metric(
            metric_payload(payload).encode_to_vec(),
        )),
    }
}

/// Frame one process payload for the stream.
pub fn process_frame(payload: &ProcessPayload) -> pb::StreamPayload {
    pb::StreamPayload {
        payload: Some(pb::stream_payload::Payload::Process(
            process_payload(payload).encode_to_vec(),
        )),
    }
}

/// Frame one pass-through OTLP trace request for the stream.
pub fn trace_frame(payload: &TracePayload) -> pb::StreamPayload {
    pb::StreamPayload {
        payload: Some(pb::stream_payload::Payload::Trace(
            payload.encode_to_vec(),
        )),
    }
}
