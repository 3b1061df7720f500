// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Senders: the transport side of the pipelines.
//!
//! The [`connection`] manager owns the one shared channel, the global pause
//! deadline and the disconnect broadcast. Each streaming signal runs a
//! [`stream::StreamSender`]; logs go through the unary
//! [`logs::LogsSender`]. [`retry`] holds the backoff schedules, [`encode`]
//! the wire conversions, and [`otlp`] the log export mapping.

pub mod connection;
pub mod encode;
pub mod logs;
pub mod otlp;
pub mod retry;
pub mod stream;

pub use connection::{ConnectionConfig, ConnectionError, ConnectionManager};
pub use stream::{CommandHandler, SendError, StreamSender};
