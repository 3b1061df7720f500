// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Metrics runner: tick, collect, split host vs container, enqueue.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collectors::MetricRegistry;
use crate::command::CommandDispatcher;
use crate::config::{Config, DEFAULT_QUEUE_CAPACITY};
use crate::health::{Health, Signal};
use crate::meta::{Meta, MetaKind};
use crate::model::{Metric, MetricPayload, PayloadIdentity};
use crate::queue::{bounded, BoundedQueue, SharedReceiver};
use crate::sender::encode;
use crate::sender::{ConnectionManager, StreamSender};

pub struct MetricsRunner {
    interval: Duration,
    workers: usize,
    registry: MetricRegistry,
    queue: BoundedQueue<MetricPayload>,
    queue_rx: SharedReceiver<MetricPayload>,
    sender: Arc<StreamSender>,
    meta: Arc<Meta>,
    agent_start_unix: i64,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MetricsRunner {
    pub fn new(
        config: &Config,
        base_meta: Arc<Meta>,
        conn: Arc<ConnectionManager>,
        health: Arc<Health>,
        root: &CancellationToken,
        agent_start_unix: i64,
    ) -> Self {
        let cancel = root.child_token();
        let (queue, queue_rx) =
            bounded(DEFAULT_QUEUE_CAPACITY, Signal::Metrics, Arc::clone(&health));
        // The metrics stream doubles as the command channel.
        let dispatcher: Arc<dyn crate::sender::CommandHandler> =
            Arc::new(CommandDispatcher::new());
        let sender = StreamSender::new(
            "metrics",
            Signal::Metrics,
            conn,
            health,
            Some(dispatcher),
            cancel.clone(),
        );
        MetricsRunner {
            interval: config.metric_interval(),
            workers: config.agent.metric_collection.workers,
            registry: MetricRegistry::new(config),
            queue,
            queue_rx,
            sender,
            meta: base_meta,
            agent_start_unix,
            cancel,
            tasks: Vec::new(),
        }
    }

    pub async fn run(&mut self) {
        if self.registry.is_empty() {
            info!("no metric collectors enabled, metrics runner idle");
        }

        self.tasks.push(Arc::clone(&self.sender).start());
        for _ in 0..self.workers {
            let sender = Arc::clone(&self.sender);
            let queue_rx = self.queue_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                sender.run_worker(queue_rx, encode::metric_frame).await;
            }));
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let metrics = self.registry.collect(&self.cancel).await;
            if metrics.is_empty() {
                continue;
            }
            let payloads = split_payloads(metrics, &self.meta, self.agent_start_unix);
            debug!(payloads = payloads.len(), "metrics tick");
            for payload in payloads {
                self.queue.offer(payload);
            }
        }
    }

    pub async fn close(&mut self) {
        self.cancel.cancel();
        self.queue.close();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// Split one tick's metrics into at most one host payload plus one payload
/// per distinct container id, each with its own enriched meta.
pub(crate) fn split_payloads(
    metrics: Vec<Metric>,
    base: &Arc<Meta>,
    agent_start_unix: i64,
) -> Vec<MetricPayload> {
    let now = SystemTime::now();
    let mut host_metrics = Vec::new();
    let mut container_batches: BTreeMap<String, Vec<Metric>> = BTreeMap::new();
    for metric in metrics {
        match metric.container_id() {
            Some(id) => container_batches
                .entry(id.to_string())
                .or_default()
                .push(metric),
            None => host_metrics.push(metric),
        }
    }

    let mut payloads = Vec::new();
    if !host_metrics.is_empty() {
        let mut meta = (**base).clone();
        meta.kind = MetaKind::Host;
        meta.apply_standard_labels(&host_metrics[0], false, agent_start_unix);
        meta.refresh_endpoint_id();
        let meta = Arc::new(meta);
        payloads.push(MetricPayload {
            identity: PayloadIdentity::from_meta(&meta, now),
            metrics: host_metrics,
            meta,
        });
    }
    for (container_id, container_metrics) in container_batches {
        let meta = Arc::new(container_meta(
            base,
            &container_id,
            &container_metrics,
            agent_start_unix,
        ));
        payloads.push(MetricPayload {
            identity: PayloadIdentity::from_meta(&meta, now),
            metrics: container_metrics,
            meta,
        });
    }
    payloads
}

/// Synthesize the per-container meta from the batch's dimensions.
fn container_meta(
    base: &Arc<Meta>,
    container_id: &str,
    metrics: &[Metric],
    agent_start_unix: i64,
) -> Meta {
    let mut meta = (**base).clone();
    meta.kind = MetaKind::Container;
    meta.container_id = container_id.to_string();

    for metric in metrics {
        let dims = &metric.dimensions;
        if meta.container_name.is_empty() {
            if let Some(name) = dims.get("name").or_else(|| dims.get("container_name")) {
                if !name.is_empty() {
                    meta.container_name = name.clone();
                }
            }
        }
        if meta.container_image_id.is_empty() {
            if let Some(image_id) = dims.get("image_id") {
                if !image_id.is_empty() {
                    meta.container_image_id = image_id.clone();
                }
            }
        }
        if meta.container_image_name.is_empty() {
            if let Some(image) = dims.get("image") {
                if !image.is_empty() {
                    meta.container_image_name = image.clone();
                }
            }
        }
        if metric.name == "running" {
            let status = if metric.value == 1.0 { "running" } else { "stopped" };
            meta.tags.insert("status".to_string(), status.to_string());
        }
    }

    meta.apply_standard_labels(&metrics[0], true, agent_start_unix);
    meta.refresh_endpoint_id();
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{endpoint_id, JOB_AGENT, JOB_CONTAINER};
    use crate::model::CONTAINER_ID_DIMENSION;

    fn base_meta() -> Arc<Meta> {
        let mut meta = Meta {
            agent_id: "agent-1".into(),
            host_id: "host-1".into(),
            hostname: "web-01".into(),
            kind: MetaKind::Host,
            ..Default::default()
        };
        meta.refresh_endpoint_id();
        Arc::new(meta)
    }

    fn host_metric(name: &str) -> Metric {
        Metric::gauge("System", "CPU", name, 1.0, "percent")
    }

    fn container_metric(name: &str, container_id: &str, value: f64) -> Metric {
        Metric::gauge("Container", "Docker", name, value, "")
            .with_dimension(CONTAINER_ID_DIMENSION, container_id)
            .with_dimension("name", format!("name-{container_id}"))
            .with_dimension("image", "nginx:latest")
            .with_dimension("image_id", "sha256:deadbeef")
    }

    #[test]
    fn test_host_only_tick_emits_one_payload() {
        let base = base_meta();
        let payloads = split_payloads(
            vec![host_metric("usage_percent"), host_metric("count")],
            &base,
            1_700_000_000,
        );
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert_eq!(payload.metrics.len(), 2);
        assert_eq!(payload.meta.kind, MetaKind::Host);
        assert_eq!(payload.meta.labels.get("job").unwrap(), JOB_AGENT);
        assert_eq!(payload.meta.labels.get("instance").unwrap(), "web-01");
        assert_eq!(payload.identity.endpoint_id, endpoint_id(&payload.meta));
    }

    #[test]
    fn test_container_split() {
        let base = base_meta();
        let metrics = vec![
            container_metric("running", "abc", 1.0),
            container_metric("cpu_percent", "abc", 12.0),
            container_metric("running", "def", 0.0),
            host_metric("usage_percent"),
        ];
        let payloads = split_payloads(metrics, &base, 0);

        // One host payload plus one per distinct container id.
        assert_eq!(payloads.len(), 3);
        let host = &payloads[0];
        assert_eq!(host.meta.kind, MetaKind::Host);
        assert_eq!(host.metrics.len(), 1);

        let abc = payloads
            .iter()
            .find(|p| p.meta.container_id == "abc")
            .unwrap();
        assert_eq!(abc.metrics.len(), 2);
        assert_eq!(abc.meta.kind, MetaKind::Container);
        assert_eq!(abc.meta.container_name, "name-abc");
        assert_eq!(abc.meta.container_image_name, "nginx:latest");
        assert_eq!(abc.meta.container_image_id, "sha256:deadbeef");
        assert_eq!(abc.meta.tags.get("status").unwrap(), "running");
        assert_eq!(abc.meta.labels.get("job").unwrap(), JOB_CONTAINER);
        assert_eq!(abc.meta.labels.get("instance").unwrap(), "name-abc");
        assert_eq!(abc.identity.endpoint_id, endpoint_id(&abc.meta));

        let def = payloads
            .iter()
            .find(|p| p.meta.container_id == "def")
            .unwrap();
        assert_eq!(def.metrics.len(), 1);
        assert_eq!(def.meta.tags.get("status").unwrap(), "stopped");

        // Container endpoints differ from the host endpoint.
        assert_ne!(abc.identity.endpoint_id, host.identity.endpoint_id);
        assert_ne!(abc.identity.endpoint_id, def.identity.endpoint_id);
    }

    #[test]
    fn test_empty_container_id_is_host() {
        let base = base_meta();
        let metrics = vec![
            host_metric("usage_percent").with_dimension(CONTAINER_ID_DIMENSION, ""),
        ];
        let payloads = split_payloads(metrics, &base, 0);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].meta.kind, MetaKind::Host);
    }

    #[test]
    fn test_base_meta_is_not_mutated() {
        let base = base_meta();
        let before = (*base).clone();
        let _ = split_payloads(
            vec![
                host_metric("usage_percent"),
                container_metric("running", "abc", 1.0),
            ],
            &base,
            42,
        );
        assert_eq!(*base, before);
        assert!(base.labels.is_empty());
        assert!(!base.tags.contains_key("status"));
    }

    #[test]
    fn test_no_payloads_for_empty_tick() {
        let base = base_meta();
        assert!(split_payloads(Vec::new(), &base, 0).is_empty());
    }

    #[tokio::test]
    async fn test_zero_workers_spawns_no_worker_tasks() {
        let mut config = Config::default();
        config.agent.metric_collection.workers = 0;
        let root = CancellationToken::new();
        let mut runner = MetricsRunner::new(
            &config,
            base_meta(),
            Arc::new(ConnectionManager::new(Default::default())),
            Arc::new(Health::new()),
            &root,
            0,
        );

        root.cancel();
        runner.run().await;

        // Only the connection task; nothing dequeues with zero workers.
        assert_eq!(runner.tasks.len(), 1);
        runner.close().await;
    }
}
