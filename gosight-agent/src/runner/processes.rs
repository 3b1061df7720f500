// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Processes runner: one snapshot payload per tick.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collectors::ProcessRegistry;
use crate::config::{Config, DEFAULT_QUEUE_CAPACITY};
use crate::health::{Health, Signal};
use crate::meta::Meta;
use crate::model::{PayloadIdentity, ProcessPayload};
use crate::queue::{bounded, BoundedQueue, SharedReceiver};
use crate::sender::encode;
use crate::sender::{ConnectionManager, StreamSender};

pub struct ProcessesRunner {
    interval: Duration,
    workers: usize,
    registry: ProcessRegistry,
    queue: BoundedQueue<ProcessPayload>,
    queue_rx: SharedReceiver<ProcessPayload>,
    sender: Arc<StreamSender>,
    meta: Arc<Meta>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ProcessesRunner {
    pub fn new(
        config: &Config,
        base_meta: Arc<Meta>,
        conn: Arc<ConnectionManager>,
        health: Arc<Health>,
        root: &CancellationToken,
    ) -> Self {
        let cancel = root.child_token();
        let (queue, queue_rx) = bounded(
            DEFAULT_QUEUE_CAPACITY,
            Signal::Processes,
            Arc::clone(&health),
        );
        let sender = StreamSender::new(
            "processes",
            Signal::Processes,
            conn,
            health,
            None,
            cancel.clone(),
        );
        ProcessesRunner {
            interval: config.process_interval(),
            workers: config.agent.process_collection.workers,
            registry: ProcessRegistry::new(config),
            queue,
            queue_rx,
            sender,
            meta: base_meta,
            cancel,
            tasks: Vec::new(),
        }
    }

    pub async fn run(&mut self) {
        self.tasks.push(Arc::clone(&self.sender).start());
        for _ in 0..self.workers {
            let sender = Arc::clone(&self.sender);
            let queue_rx = self.queue_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                sender.run_worker(queue_rx, encode::process_frame).await;
            }));
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(snapshot) = self.registry.collect(&self.cancel).await else {
                continue;
            };
            debug!(processes = snapshot.processes.len(), "process tick");
            self.queue.offer(ProcessPayload {
                identity: PayloadIdentity::from_meta(&self.meta, SystemTime::now()),
                snapshot,
                meta: Arc::clone(&self.meta),
            });
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
