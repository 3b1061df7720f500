// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! The GoSight agent runtime.
//!
//! The agent samples the local machine through pluggable collectors, wraps
//! every sample in an immutable identity envelope ([`meta::Meta`]) and fans
//! the results into per-signal pipelines: a [`runner`] ticks a collector
//! registry on its own cadence and enqueues payloads into a bounded queue,
//! and a [`sender`] drains that queue over a long-lived gRPC stream (or the
//! unary OTLP export for logs), surviving server outages with coordinated
//! backoff. Remote commands arrive interleaved on the metrics stream and are
//! answered in-band by the [`command`] dispatcher.

pub mod agent;
pub mod collectors;
pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod meta;
pub mod model;
pub mod queue;
pub mod runner;
pub mod sender;
