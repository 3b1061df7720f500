// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Logs runner: tick, collect batches, enrich with merged meta, enqueue.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collectors::LogRegistry;
use crate::config::Config;
use crate::health::{Health, Signal};
use crate::meta::Meta;
use crate::model::{LogEntry, LogPayload, PayloadIdentity};
use crate::queue::{bounded, BoundedQueue, SharedReceiver};
use crate::sender::logs::LogsSender;
use crate::sender::ConnectionManager;

pub struct LogsRunner {
    interval: Duration,
    workers: usize,
    registry: LogRegistry,
    queue: BoundedQueue<LogPayload>,
    queue_rx: SharedReceiver<LogPayload>,
    sender: Arc<LogsSender>,
    meta: Arc<Meta>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LogsRunner {
    pub fn new(
        config: &Config,
        base_meta: Arc<Meta>,
        conn: Arc<ConnectionManager>,
        health: Arc<Health>,
        root: &CancellationToken,
    ) -> Self {
        let cancel = root.child_token();
        let (queue, queue_rx) = bounded(
            config.agent.log_collection.buffer_size,
            Signal::Logs,
            Arc::clone(&health),
        );
        let sender = LogsSender::new(conn, health, cancel.clone());
        LogsRunner {
            interval: config.log_interval(),
            workers: config.agent.log_collection.workers,
            registry: LogRegistry::new(config),
            queue,
            queue_rx,
            sender,
            meta: base_meta,
            cancel,
            tasks: Vec::new(),
        }
    }

    pub async fn run(&mut self) {
        if self.registry.is_empty() {
            info!("no log sources enabled, logs runner idle");
        }

        for _ in 0..self.workers {
            let sender = Arc::clone(&self.sender);
            let queue_rx = self.queue_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                sender.run_worker(queue_rx).await;
            }));
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let batches = self.registry.collect(&self.cancel).await;
            if batches.is_empty() {
                continue;
            }
            debug!(batches = batches.len(), "logs tick");
            for batch in batches {
                if batch.is_empty() {
                    continue;
                }
                self.queue.offer(batch_payload(batch, &self.meta));
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

/// Wrap one collected batch into a payload carrying a clone of the base
/// meta, merged with the first log-local meta found in the batch.
fn batch_payload(batch: Vec<LogEntry>, base: &Arc<Meta>) -> LogPayload {
    let mut meta = match batch.iter().find_map(|entry| entry.meta.as_ref()) {
        Some(log_meta) => base.merge_with_base(log_meta),
        None => (**base).clone(),
    };
    meta.refresh_endpoint_id();
    let meta = Arc::new(meta);
    LogPayload {
        identity: PayloadIdentity::from_meta(&meta, SystemTime::now()),
        entries: batch,
        meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::endpoint_id;
    use crate::model::LogMeta;

    fn base_meta() -> Arc<Meta> {
        let mut meta = Meta {
            agent_id: "agent-1".into(),
            host_id: "host-1".into(),
            hostname: "web-01".into(),
            service: "base-service".into(),
            ..Default::default()
        };
        meta.refresh_endpoint_id();
        Arc::new(meta)
    }

    #[test]
    fn test_batch_payload_clones_base_meta() {
        let base = base_meta();
        let batch = vec![LogEntry {
            body: "hello".into(),
            ..Default::default()
        }];
        let payload = batch_payload(batch, &base);
        assert_eq!(payload.meta.service, "base-service");
        assert_eq!(payload.entries.len(), 1);
        assert_eq!(payload.identity.endpoint_id, endpoint_id(&payload.meta));
    }

    #[test]
    fn test_batch_payload_merges_log_meta() {
        let base = base_meta();
        let batch = vec![
            LogEntry {
                body: "no meta".into(),
                ..Default::default()
            },
            LogEntry {
                body: "with meta".into(),
                meta: Some(LogMeta {
                    service: "sshd".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let payload = batch_payload(batch, &base);
        assert_eq!(payload.meta.service, "sshd");
        // The merged service changes the endpoint identity.
        assert_ne!(payload.identity.endpoint_id, base.endpoint_id);
        assert_eq!(payload.identity.endpoint_id, endpoint_id(&payload.meta));
        // Base is untouched.
        assert_eq!(base.service, "base-service");
    }

    #[tokio::test]
    async fn test_zero_workers_fills_queue_and_drops() {
        let mut config = Config::default();
        config.agent.log_collection.workers = 0;
        config.agent.log_collection.buffer_size = 2;
        let health = Arc::new(Health::new());
        let root = CancellationToken::new();
        let mut runner = LogsRunner::new(
            &config,
            base_meta(),
            Arc::new(ConnectionManager::new(Default::default())),
            Arc::clone(&health),
            &root,
        );

        root.cancel();
        runner.run().await;
        assert!(runner.tasks.is_empty());

        // With no workers nothing drains: the queue holds two payloads and
        // the rest are dropped.
        let base = base_meta();
        let entry = || LogEntry {
            body: "x".into(),
            ..Default::default()
        };
        let offers: Vec<bool> = (0..5)
            .map(|_| runner.queue.offer(batch_payload(vec![entry()], &base)))
            .collect();
        assert_eq!(offers, vec![true, true, false, false, false]);
        assert_eq!(health.snapshot(Signal::Logs).dropped, 3);
        assert_eq!(health.snapshot(Signal::Logs).sent, 0);
        runner.close().await;
    }
}
