// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Conversion of log payloads into canonical OTLP export requests.
//!
//! Resource attributes are derived from the payload meta, entries are
//! grouped into one scope per log source, and severity numbers follow the
//! fixed canonical table. Only non-empty values are emitted.

use std::collections::BTreeMap;

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::resource::v1::Resource;

use crate::meta::Meta;
use crate::model::{LogEntry, LogPayload};
use crate::sender::encode::unix_nanos;

/// Scope name used when a log entry does not carry a source.
const UNKNOWN_SCOPE: &str = "unknown";

/// Map a canonical severity name to its OTLP severity number.
///
/// The mapping is total: anything outside the table is `0` (unspecified).
pub fn severity_number(severity_text: &str) -> i32 {
    match severity_text.to_ascii_lowercase().as_str() {
        "trace" => 1,
        "debug" => 5,
        "info" => 9,
        "notice" => 9,
        "warn" | "warning" => 13,
        "error" => 17,
        "fatal" | "critical" => 21,
        _ => 0,
    }
}

fn string_value(value: &str) -> AnyValue {
    AnyValue {
        value: Some(any_value::Value::StringValue(value.to_string())),
    }
}

fn int_value(value: i64) -> AnyValue {
    AnyValue {
        value: Some(any_value::Value::IntValue(value)),
    }
}

fn push_attr(attributes: &mut Vec<KeyValue>, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    attributes.push(KeyValue {
        key: key.to_string(),
        value: Some(string_value(value)),
    });
}

/// Resource attributes for one payload, from its meta and identity.
fn resource_attributes(payload: &LogPayload) -> Vec<KeyValue> {
    let meta: &Meta = &payload.meta;
    let mut attrs = Vec::new();

    push_attr(&mut attrs, "host.id", &payload.identity.host_id);
    push_attr(&mut attrs, "host.name", &payload.identity.hostname);
    push_attr(&mut attrs, "agent.id", &payload.identity.agent_id);
    push_attr(&mut attrs, "endpoint.id", &payload.identity.endpoint_id);
    push_attr(&mut attrs, "resource.id", &meta.endpoint_id);
    push_attr(&mut attrs, "resource.kind", meta.kind.as_str());
    push_attr(&mut attrs, "agent.version", &meta.agent_version);

    push_attr(&mut attrs, "os.type", &meta.os);
    push_attr(&mut attrs, "os.version", &meta.os_version);
    push_attr(&mut attrs, "platform", &meta.platform);
    push_attr(&mut attrs, "platform.family", &meta.platform_family);
    push_attr(&mut attrs, "platform.version", &meta.platform_version);
    push_attr(&mut attrs, "arch", &meta.architecture);
    push_attr(&mut attrs, "kernel.version", &meta.kernel_version);
    push_attr(&mut attrs, "kernel.architecture", &meta.kernel_architecture);

    push_attr(&mut attrs, "cloud.provider", &meta.cloud_provider);
    push_attr(&mut attrs, "cloud.region", &meta.region);
    push_attr(&mut attrs, "cloud.zone", &meta.availability_zone);
    push_attr(&mut attrs, "cloud.account.id", &meta.account_id);
    push_attr(&mut attrs, "cloud.project.id", &meta.project_id);
    push_attr(&mut attrs, "cloud.instance.id", &meta.instance_id);
    push_attr(&mut attrs, "cloud.instance.type", &meta.instance_type);
    push_attr(&mut attrs, "cloud.resource.group", &meta.resource_group);
    push_attr(&mut attrs, "cloud.vpc.id", &meta.vpc_id);
    push_attr(&mut attrs, "cloud.subnet.id", &meta.subnet_id);
    push_attr(&mut attrs, "cloud.image.id", &meta.image_id);
    push_attr(&mut attrs, "cloud.service.id", &meta.service_id);

    push_attr(&mut attrs, "container.id", &meta.container_id);
    push_attr(&mut attrs, "container.name", &meta.container_name);
    push_attr(&mut attrs, "container.image.id", &meta.container_image_id);
    push_attr(&mut attrs, "container.image.name", &meta.container_image_name);
    push_attr(&mut attrs, "k8s.pod.name", &meta.pod_name);
    push_attr(&mut attrs, "k8s.namespace.name", &meta.namespace);
    push_attr(&mut attrs, "k8s.cluster.name", &meta.cluster_name);
    push_attr(&mut attrs, "k8s.node.name", &meta.node_name);

    push_attr(&mut attrs, "application", &meta.application);
    push_attr(&mut attrs, "service.name", &meta.service);
    push_attr(&mut attrs, "service.version", &meta.version);
    push_attr(&mut attrs, "environment", &meta.environment);
    push_attr(&mut attrs, "deployment.id", &meta.deployment_id);

    push_attr(&mut attrs, "host.ip", &meta.ip_address);
    push_attr(&mut attrs, "host.public_ip", &meta.public_ip);
    push_attr(&mut attrs, "host.private_ip", &meta.private_ip);
    push_attr(&mut attrs, "host.mac", &meta.mac_address);
    push_attr(&mut attrs, "network.interface", &meta.network_interface);

    // Stable order for the free-form tags.
    let tags: BTreeMap<_, _> = meta.tags.iter().collect();
    for (key, value) in tags {
        push_attr(&mut attrs, &format!("tag.{key}"), value);
    }
    attrs
}

fn log_record(entry: &LogEntry) -> LogRecord {
    let mut attributes = Vec::new();
    push_attr(&mut attributes, "log.source", &entry.source);
    push_attr(&mut attributes, "log.category", &entry.category);
    if entry.pid != 0 {
        attributes.push(KeyValue {
            key: "process.pid".to_string(),
            value: Some(int_value(entry.pid as i64)),
        });
    }

    let fields: BTreeMap<_, _> = entry.fields.iter().collect();
    for (key, value) in fields {
        push_attr(&mut attributes, &format!("field.{key}"), value);
    }
    let tags: BTreeMap<_, _> = entry.tags.iter().collect();
    for (key, value) in tags {
        push_attr(&mut attributes, &format!("tag.{key}"), value);
    }
    let extra: BTreeMap<_, _> = entry.attributes.iter().collect();
    for (key, value) in extra {
        push_attr(&mut attributes, &format!("label.{key}"), value);
    }
    if let Some(meta) = &entry.meta {
        push_attr(&mut attributes, "log.unit", &meta.unit);
        push_attr(&mut attributes, "log.service", &meta.service);
        push_attr(&mut attributes, "log.user", &meta.user);
        push_attr(&mut attributes, "log.executable", &meta.executable);
        push_attr(&mut attributes, "log.path", &meta.path);
        let extra: BTreeMap<_, _> = meta.extra.iter().collect();
        for (key, value) in extra {
            push_attr(&mut attributes, &format!("log.{key}"), value);
        }
    }

    LogRecord {
        time_unix_nano: entry.timestamp.map(|t| unix_nanos(t) as u64).unwrap_or(0),
        observed_time_unix_nano: entry
            .observed_timestamp
            .map(|t| unix_nanos(t) as u64)
            .unwrap_or(0),
        severity_number: severity_number(&entry.severity_text),
        severity_text: entry.severity_text.clone(),
        body: Some(string_value(&entry.body)),
        attributes,
        dropped_attributes_count: 0,
        flags: entry.flags,
        trace_id: entry
            .trace_id
            .as_deref()
            .and_then(|id| hex::decode(id).ok())
            .unwrap_or_default(),
        span_id: entry
            .span_id
            .as_deref()
            .and_then(|id| hex::decode(id).ok())
            .unwrap_or_default(),
        ..Default::default()
    }
}

/// Build the canonical OTLP export request for one log payload.
///
/// Entries are grouped by source into one scope each; the scope name is the
/// source (or `"unknown"`).
pub fn to_export_request(payload: &LogPayload) -> ExportLogsServiceRequest {
    let mut scopes: BTreeMap<String, Vec<LogRecord>> = BTreeMap::new();
    for entry in &payload.entries {
        let source = if entry.source.is_empty() {
            UNKNOWN_SCOPE.to_string()
        } else {
            entry.source.clone()
        };
        scopes.entry(source).or_default().push(log_record(entry));
    }

    let scope_logs: Vec<ScopeLogs> = scopes
        .into_iter()
        .map(|(name, log_records)| ScopeLogs {
            scope: Some(InstrumentationScope {
                name,
                ..Default::default()
            }),
            log_records,
            ..Default::default()
        })
        .collect();

    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: Some(Resource {
                attributes: resource_attributes(payload),
                ..Default::default()
            }),
            scope_logs,
            ..Default::default()
        }],
    }
}
