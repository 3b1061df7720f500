// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Domain types produced by collectors and consumed by the pipelines.
//!
//! Wire conversion happens at the sender boundary (`sender::encode`), so the
//! collectors and runners never see protobuf types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::meta::Meta;

/// Dimension key that classifies a metric as belonging to a container.
pub const CONTAINER_ID_DIMENSION: &str = "container_id";

/// The kind of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricKind {
    #[default]
    Gauge,
    Counter,
    Histogram,
    Summary,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

/// Pre-aggregated distribution statistics attached to a metric.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatisticValues {
    pub minimum: f64,
    pub maximum: f64,
    pub sample_count: u64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataPoint {
    pub timestamp: Option<SystemTime>,
    pub value: f64,
    pub attributes: HashMap<String, String>,
}

/// One sampled value with its namespace and dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub namespace: String,
    pub sub_namespace: String,
    pub name: String,
    pub timestamp: SystemTime,
    pub unit: String,
    pub kind: MetricKind,
    pub value: f64,
    pub data_points: Vec<DataPoint>,
    pub dimensions: HashMap<String, String>,
    pub statistic_values: Option<StatisticValues>,
}

impl Metric {
    /// Shorthand for the common case of a plain gauge.
    pub fn gauge(
        namespace: &str,
        sub_namespace: &str,
        name: &str,
        value: f64,
        unit: &str,
    ) -> Self {
        Metric {
            namespace: namespace.to_string(),
            sub_namespace: sub_namespace.to_string(),
            name: name.to_string(),
            timestamp: SystemTime::now(),
            unit: unit.to_string(),
            kind: MetricKind::Gauge,
            value,
            data_points: Vec::new(),
            dimensions: HashMap::new(),
            statistic_values: None,
        }
    }

    /// Shorthand for a monotonic counter sample.
    pub fn counter(
        namespace: &str,
        sub_namespace: &str,
        name: &str,
        value: f64,
        unit: &str,
    ) -> Self {
        Metric {
            kind: MetricKind::Counter,
            ..Metric::gauge(namespace, sub_namespace, name, value, unit)
        }
    }

    pub fn with_dimension(mut self, key: &str, value: impl Into<String>) -> Self {
        self.dimensions.insert(key.to_string(), value.into());
        self
    }

    /// The non-empty container id dimension, if any. Metrics with an empty
    /// `container_id` are host metrics.
    pub fn container_id(&self) -> Option<&str> {
        self.dimensions
            .get(CONTAINER_ID_DIMENSION)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Log-local metadata attached by a log collector; merged over the base
/// [`Meta`] when the payload is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogMeta {
    pub service: String,
    pub unit: String,
    pub container_id: String,
    pub container_name: String,
    pub user: String,
    pub executable: String,
    pub path: String,
    pub extra: HashMap<String, String>,
}

/// One structured log record.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub timestamp: Option<SystemTime>,
    pub observed_timestamp: Option<SystemTime>,
    pub severity_text: String,
    pub body: String,
    pub source: String,
    pub category: String,
    pub pid: u32,
    pub fields: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub attributes: HashMap<String, String>,
    pub meta: Option<LogMeta>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub flags: u32,
}

/// Suffix appended when a log body exceeds the configured maximum length.
pub const TRUNCATION_SUFFIX: &str = " [truncated]";

/// Truncate `body` to at most `max` bytes (on a char boundary) and append
/// the literal truncation suffix. A `max` of zero disables truncation.
pub fn truncate_message(body: &str, max: usize) -> String {
    if max == 0 || body.len() <= max {
        return body.to_string();
    }
    let mut cut = max;
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &body[..cut], TRUNCATION_SUFFIX)
}

/// One sampled process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub user: String,
    pub executable: String,
    pub cmdline: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub threads: u32,
    pub start_time: Option<SystemTime>,
    pub tags: HashMap<String, String>,
}

/// A full process table snapshot for one tick.
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    pub timestamp: Option<SystemTime>,
    pub processes: Vec<ProcessInfo>,
}

/// Externally received OTLP trace request, forwarded untouched.
pub type TracePayload = opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

/// Identity fields every payload carries, copied out of its meta so the
/// server can route without decoding the envelope.
#[derive(Debug, Clone)]
pub struct PayloadIdentity {
    pub agent_id: String,
    pub host_id: String,
    pub hostname: String,
    pub endpoint_id: String,
    pub timestamp: SystemTime,
}

impl PayloadIdentity {
    pub fn from_meta(meta: &Meta, timestamp: SystemTime) -> Self {
        PayloadIdentity {
            agent_id: meta.agent_id.clone(),
            host_id: meta.host_id.clone(),
            hostname: meta.hostname.clone(),
            endpoint_id: meta.endpoint_id.clone(),
            timestamp,
        }
    }
}

impl Default for Metric {
    fn default() -> Self {
        Metric::gauge("", "", "", 0.0, "")
    }
}

/// One unit of metric transmission: a batch of metrics plus one shared meta.
#[derive(Debug, Clone)]
pub struct MetricPayload {
    pub identity: PayloadIdentity,
    pub metrics: Vec<Metric>,
    pub meta: Arc<Meta>,
}

/// One unit of log transmission.
#[derive(Debug, Clone)]
pub struct LogPayload {
    pub identity: PayloadIdentity,
    pub entries: Vec<LogEntry>,
    pub meta: Arc<Meta>,
}

/// One process snapshot in transit.
#[derive(Debug, Clone)]
pub struct ProcessPayload {
    pub identity: PayloadIdentity,
    pub snapshot: ProcessSnapshot,
    pub meta: Arc<Meta>,
}
