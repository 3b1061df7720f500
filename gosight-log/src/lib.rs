// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Logger initialization for the GoSight agent.
//!
//! The agent writes its own diagnostics to a set of per-purpose files (app,
//! error, debug) plus stderr, all fed from one `tracing` subscriber. Each
//! destination is a `fmt` layer with its own level filter; file output goes
//! through non-blocking appenders so a slow disk never stalls a send path.

mod logger;
mod writers;

pub use logger::{init, LogLevel, LoggerConfig, LoggerGuard};
