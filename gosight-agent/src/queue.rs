// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Bounded in-memory payload queue between a runner and its sender workers.
//!
//! Producers never block: when the queue is full the newest batch is dropped
//! and counted. Consumers block until the next batch or queue close.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::health::{Health, Signal};

/// Producer half, owned by the runner.
pub struct BoundedQueue<T> {
    tx: mpsc::Sender<T>,
    signal: Signal,
    health: Arc<Health>,
}

/// Consumer half, shared by the sender workers. Only one worker waits on the
/// channel at a time; the lock is released as soon as a batch is popped.
pub struct SharedReceiver<T> {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        SharedReceiver {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> SharedReceiver<T> {
    /// Wait for the next batch. Returns `None` once the queue is closed and
    /// drained.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Pop without waiting; used by tests and drain paths.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

/// Create a bounded queue of `capacity` batches for `signal`.
pub fn bounded<T>(
    capacity: usize,
    signal: Signal,
    health: Arc<Health>,
) -> (BoundedQueue<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BoundedQueue { tx, signal, health },
        SharedReceiver {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        },
    )
}

impl<T> BoundedQueue<T> {
    /// Offer a batch without blocking. Returns `true` when enqueued; a full
    /// or closed queue drops the batch, warns and counts the drop.
    pub fn offer(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => {
                self.health.record_enqueued(self.signal);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.health.record_dropped(self.signal);
                warn!(
                    signal = self.signal.as_str(),
                    "queue full, dropping newest batch"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.health.record_dropped(self.signal);
                warn!(
                    signal = self.signal.as_str(),
                    "queue closed, dropping batch"
                );
                false
            }
        }
    }

    /// Stop accepting new work; workers drain what is already queued.
    pub fn close(&mut self) {
        // Dropping the sender closes the channel once all clones are gone;
        // BoundedQueue is the only producer so replacing it is enough.
        let (tx, _) = mpsc::channel(1);
        self.tx = tx;
    }
}
