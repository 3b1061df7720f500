// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! In-process health counters for the pipelines.
//!
//! Every queue offer, drop, send and reconnect updates one of these atomic
//! counters. They are cheap enough to update from hot paths and are logged
//! periodically by the agent so an operator can spot back-pressure without a
//! metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};

/// The telemetry signal a counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Metrics,
    Logs,
    Processes,
    Traces,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Metrics => "metrics",
            Signal::Logs => "logs",
            Signal::Processes => "processes",
            Signal::Traces => "traces",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

const SIGNALS: [Signal; 4] = [
    Signal::Metrics,
    Signal::Logs,
    Signal::Processes,
    Signal::Traces,
];

#[derive(Debug, Default)]
struct SignalCounters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Process-wide pipeline counters. Shared as `Arc<Health>`.
#[derive(Debug, Default)]
pub struct Health {
    signals: [SignalCounters; 4],
    reconnects: AtomicU64,
    commands: AtomicU64,
}

/// A point-in-time copy of one signal's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub sent: u64,
    pub send_failures: u64,
}

impl Health {
    pub fn new() -> Self {
        Health::default()
    }

    pub fn record_enqueued(&self, signal: Signal) {
        self.signals[signal.index()]
            .enqueued
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, signal: Signal) {
        self.signals[signal.index()]
            .dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, signal: Signal) {
        self.signals[signal.index()]
            .sent
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self, signal: Signal) {
        self.signals[signal.index()]
            .send_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, signal: Signal) -> SignalSnapshot {
        let counters = &self.signals[signal.index()];
        SignalSnapshot {
            enqueued: counters.enqueued.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            sent: counters.sent.load(Ordering::Relaxed),
            send_failures: counters.send_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    /// Log one debug line per signal with the current counter values.
    pub fn log_snapshot(&self) {
        for signal in SIGNALS {
            let snap = self.snapshot(signal);
            tracing::debug!(
                signal = signal.as_str(),
                enqueued = snap.enqueued,
                dropped = snap.dropped,
                sent = snap.sent,
                send_failures = snap.send_failures,
                "pipeline counters"
            );
        }
        tracing::debug!(
            reconnects = self.reconnects(),
            commands = self.commands(),
            "transport counters"
        );
    }
}
