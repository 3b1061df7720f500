// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Traces runner: receive-and-forward of externally produced OTLP.
//!
//! The agent does not synthesize spans. An embedding OTLP receiver pushes
//! complete `ExportTraceServiceRequest`s through the [`TraceIngest`] handle;
//! the runner enqueues them untouched and the workers forward them on the
//! trace stream.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{Config, DEFAULT_QUEUE_CAPACITY};
use crate::health::{Health, Signal};
use crate::model::TracePayload;
use crate::queue::{bounded, BoundedQueue, SharedReceiver};
use crate::sender::encode;
use crate::sender::{ConnectionManager, StreamSender};

/// Depth of the hand-off channel between the external receiver and the
/// runner; the bounded queue behind it is the real buffer.
const INGEST_BUFFER: usize = 64;

/// Handle the embedding OTLP receiver uses to feed traces to the runner.
#[derive(Clone)]
pub struct TraceIngest {
    tx: mpsc::Sender<TracePayload>,
}

impl TraceIngest {
    /// Offer one trace request without blocking; a saturated runner drops
    /// it, matching the queue policy everywhere else.
    pub fn try_submit(&self, payload: TracePayload) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(_) => {
                warn!("trace ingest saturated, dropping trace payload");
                false
            }
        }
    }
}

pub struct TracesRunner {
    workers: usize,
    ingest_rx: mpsc::Receiver<TracePayload>,
    queue: BoundedQueue<TracePayload>,
    queue_rx: SharedReceiver<TracePayload>,
    sender: Arc<StreamSender>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TracesRunner {
    pub fn new(
        config: &Config,
        conn: Arc<ConnectionManager>,
        health: Arc<Health>,
        root: &CancellationToken,
    ) -> (Self, TraceIngest) {
        let cancel = root.child_token();
        let (ingest_tx, ingest_rx) = mpsc::channel(INGEST_BUFFER);
        let (queue, queue_rx) =
            bounded(DEFAULT_QUEUE_CAPACITY, Signal::Traces, Arc::clone(&health));
        let sender = StreamSender::new(
            "traces",
            Signal::Traces,
            conn,
            health,
            None,
            cancel.clone(),
        );
        (
            TracesRunner {
                workers: config.agent.trace_collection.workers,
                ingest_rx,
                queue,
                queue_rx,
                sender,
                cancel,
                tasks: Vec::new(),
            },
            TraceIngest { tx: ingest_tx },
        )
    }

    pub async fn run(&mut self) {
        self.tasks.push(Arc::clone(&self.sender).start());
        for _ in 0..self.workers {
            let sender = Arc::clone(&self.sender);
            let queue_rx = self.queue_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                sender.run_worker(queue_rx, encode::trace_frame).await;
            }));
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                payload = self.ingest_rx.recv() => match payload {
                    Some(payload) => {
                        self.queue.offer(payload);
                    }
                    None => break,
                },
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_hands_payloads_to_the_queue() {
        let config = Config::default();
        let health = Arc::new(Health::new());
        let conn = Arc::new(ConnectionManager::new(Default::default()));
        let root = CancellationToken::new();
        let (mut runner, ingest) = TracesRunner::new(&config, conn, Arc::clone(&health), &root);

        assert!(ingest.try_submit(TracePayload::default()));

        // Drive one hand-off without starting workers.
        let payload = runner.ingest_rx.recv().await.unwrap();
        assert!(runner.queue.offer(payload));
        assert_eq!(health.snapshot(Signal::Traces).enqueued, 1);
        assert!(runner.queue_rx.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_zero_workers_spawns_no_worker_tasks() {
        let mut config = Config::default();
        config.agent.trace_collection.workers = 0;
        let root = CancellationToken::new();
        let (mut runner, _ingest) = TracesRunner::new(
            &config,
            Arc::new(ConnectionManager::new(Default::default())),
            Arc::new(Health::new()),
            &root,
        );

        root.cancel();
        runner.run().await;

        // Only the connection task; nothing dequeues with zero workers.
        assert_eq!(runner.tasks.len(), 1);
        runner.close().await;
    }
}
