// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Per-signal runners: the cadenced drivers of the pipelines.
//!
//! A runner owns its collector registry, its bounded queue and its sender
//! (plus the sender's worker pool). Every tick it collects, enriches and
//! splits the output into payloads, then offers each payload to the queue
//! without blocking; a full queue drops the batch. Cancellation stops the
//! tick loop, closes the queue and waits for the workers to drain.

pub mod logs;
pub mod metrics;
pub mod processes;
pub mod traces;

pub use logs::LogsRunner;
pub use metrics::MetricsRunner;
pub use processes::ProcessesRunner;
pub use traces::{TraceIngest, TracesRunner};
