// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Long-lived bidirectional stream sender.
//!
//! One instance per streaming signal (metrics, processes, traces). A
//! background connection task keeps the stream open: it honors the shared
//! pause deadline, dials through the connection manager, opens the stream
//! and then sits in the receive loop until the stream dies, a disconnect is
//! broadcast, or a worker requests a reconnect. Workers push frames through
//! [`StreamSender::send_frame`] with a per-message timeout and retry
//! dropped batches on the worker schedule.
//!
//! The metrics instance additionally dispatches inbound server commands and
//! answers them on the same stream.

use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tonic::{Request, Streaming};
use tracing::{debug, error, info, warn};

use gosight_protocol::pb;
use gosight_protocol::StreamServiceClient;

use crate::health::{Health, Signal};
use crate::queue::SharedReceiver;
use crate::sender::connection::{ConnectionManager, MAX_MESSAGE_SIZE};
use crate::sender::retry::{self, DialBackoff, RetryStrategy};

/// Per-frame send timeout on the stream.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound frame buffer between workers and the transport.
const STREAM_BUFFER: usize = 64;

/// How long an idle worker waits before re-checking for a live stream.
const WORKER_IDLE_WAIT: Duration = Duration::from_millis(500);

/// Command responses are retried a few times with linear sleeps.
const COMMAND_SEND_ATTEMPTS: u32 = 3;

/// Errors surfaced to the worker send path.
#[derive(Debug)]
pub enum SendError {
    /// No live stream right now.
    NotConnected,
    /// The per-frame timeout elapsed.
    Timeout,
    /// The stream closed under the frame.
    StreamClosed,
    /// The server answered with a status.
    Status(tonic::Status),
}

impl Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::NotConnected => write!(f, "no live stream"),
            SendError::Timeout => write!(f, "send timed out"),
            SendError::StreamClosed => write!(f, "stream closed mid-send"),
            SendError::Status(status) => write!(f, "status {:?}: {}", status.code(), status.message()),
        }
    }
}

impl Error for SendError {}

impl SendError {
    /// Transient errors are retried on the worker schedule; permanent ones
    /// drop the batch immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            SendError::NotConnected | SendError::Timeout | SendError::StreamClosed => true,
            SendError::Status(status) => retry::is_transient(status.code()),
        }
    }
}

/// Handles a server command and produces the in-band response.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, request: pb::CommandRequest) -> pb::CommandResponse;
}

struct StreamHandle {
    tx: mpsc::Sender<pb::StreamPayload>,
}

pub struct StreamSender {
    name: &'static str,
    signal: Signal,
    conn: Arc<ConnectionManager>,
    health: Arc<Health>,
    retry: RetryStrategy,
    current: ArcSwapOption<StreamHandle>,
    reconnect: Notify,
    command_handler: Option<Arc<dyn CommandHandler>>,
    cancel: CancellationToken,
}

impl StreamSender {
    pub fn new(
        name: &'static str,
        signal: Signal,
        conn: Arc<ConnectionManager>,
        health: Arc<Health>,
        command_handler: Option<Arc<dyn CommandHandler>>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(StreamSender {
            name,
            signal,
            conn,
            health,
            retry: RetryStrategy::default(),
            current: ArcSwapOption::empty(),
            reconnect: Notify::new(),
            command_handler,
            cancel,
        })
    }

    /// Spawn the connection task that keeps the stream alive.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run_connection())
    }

    /// Whether a frame can be sent right now.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// Ask the connection task to tear the stream down and reopen it.
    pub fn request_reconnect(&self) {
        self.reconnect.notify_one();
    }

    async fn run_connection(self: Arc<Self>) {
        let mut backoff = DialBackoff::default();
        let mut last_pause = self.conn.pause_until();

        while !self.cancel.is_cancelled() {
            // A pause advance means some sender hit a persistent failure:
            // drop our stream and connection references and start clean.
            let pause = self.conn.pause_until();
            if pause > last_pause {
                self.current.store(None);
                self.conn.close().await;
                backoff.reset();
                last_pause = pause;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.conn.wait_for_resume() => {}
            }

            match self.open_stream().await {
                Ok((handle, responses)) => {
                    backoff.reset();
                    // Drain any reconnect permit stored while the stream was
                    // down; it is satisfied by the stream just opened.
                    let _ = tokio::time::timeout(Duration::ZERO, self.reconnect.notified()).await;
                    self.current.store(Some(Arc::new(handle)));
                    info!(sender = self.name, "stream established");
                    Self::receive_loop(&self, responses).await;
                    self.current.store(None);
                    self.health.record_reconnect();
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(sender = self.name, error = %e, retry_in = ?delay, "failed to open stream");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        self.current.store(None);
        debug!(sender = self.name, "connection task stopped");
    }

    async fn open_stream(
        &self,
    ) -> Result<(StreamHandle, Streaming<pb::StreamResponse>), SendError> {
        let channel = self
            .conn
            .get_conn()
            .await
            .map_err(|e| SendError::Status(tonic::Status::unavailable(e.to_string())))?;

        let mut client = StreamServiceClient::new(channel)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let responses = client
            .stream(Request::new(ReceiverStream::new(rx)))
            .await
            .map_err(SendError::Status)?
            .into_inner();
        Ok((StreamHandle { tx }, responses))
    }

    /// Sit on the inbound half of the stream until it dies or someone asks
    /// for a teardown. Inbound commands are dispatched without blocking the
    /// loop.
    async fn receive_loop(this: &Arc<Self>, mut responses: Streaming<pb::StreamResponse>) {
        let mut disconnect = this.conn.subscribe_disconnect();
        loop {
            tokio::select! {
                _ = this.cancel.cancelled() => return,
                _ = this.reconnect.notified() => {
                    debug!(sender = this.name, "reconnect requested, reopening stream");
                    return;
                }
                _ = disconnect.recv() => {
                    warn!(sender = this.name, "disconnect broadcast received, tearing stream down");
                    return;
                }
                message = responses.message() => match message {
                    Ok(Some(response)) => Self::handle_response(this, response),
                    Ok(None) => {
                        warn!(sender = this.name, "server closed the stream");
                        return;
                    }
                    Err(status) => {
                        if this.cancel.is_cancelled() {
                            return;
                        }
                        warn!(sender = this.name, code = ?status.code(), message = status.message(),
                            "stream receive failed, reconnecting");
                        return;
                    }
                }
            }
        }
    }

    fn handle_response(this: &Arc<Self>, response: pb::StreamResponse) {
        let Some(command) = response.command else {
            return;
        };
        let Some(handler) = this.command_handler.clone() else {
            debug!(sender = this.name, "ignoring command on a data-only stream");
            return;
        };
        this.health.record_command();
        let this = Arc::clone(this);
        tokio::spawn(async move {
            let response = handler.handle(command).await;
            this.send_command_response(response).await;
        });
    }

    /// Send a command response with a few linear retries, asking for a
    /// stream reconnect between failed attempts.
    async fn send_command_response(&self, response: pb::CommandResponse) {
        let frame = pb::StreamPayload {
            payload: Some(pb::stream_payload::Payload::CommandResponse(response)),
        };
        for attempt in 1..=COMMAND_SEND_ATTEMPTS {
            match self.send_frame(frame.clone()).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(sender = self.name, attempt, error = %e, "command response send failed");
                    if attempt == COMMAND_SEND_ATTEMPTS {
                        break;
                    }
                    self.request_reconnect();
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
            }
        }
        error!(sender = self.name, "dropping command response after retries");
    }

    /// Push one frame onto the live stream with the per-frame timeout.
    pub async fn send_frame(&self, frame: pb::StreamPayload) -> Result<(), SendError> {
        let Some(handle) = self.current.load_full() else {
            return Err(SendError::NotConnected);
        };
        match tokio::time::timeout(SEND_TIMEOUT, handle.tx.send(frame)).await {
            Err(_) => Err(SendError::Timeout),
            Ok(Err(_)) => Err(SendError::StreamClosed),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Send one frame, retrying transient failures on the worker schedule
    /// with a stream reconnect between attempts. When every attempt fails
    /// the disconnect broadcast is signaled and the frame is dropped.
    pub async fn send_with_retry(&self, frame: pb::StreamPayload) -> Result<(), SendError> {
        match self.send_frame(frame.clone()).await {
            Ok(()) => {
                self.health.record_sent(self.signal);
                return Ok(());
            }
            Err(e) if !e.is_transient() => {
                self.health.record_send_failure(self.signal);
                warn!(sender = self.name, error = %e, "permanent send failure, dropping batch");
                return Err(e);
            }
            Err(e) => {
                self.health.record_send_failure(self.signal);
                debug!(sender = self.name, error = %e, "transient send failure, retrying");
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.request_reconnect();
            self.retry.delay(attempt).await;
            match self.send_frame(frame.clone()).await {
                Ok(()) => {
                    self.health.record_sent(self.signal);
                    return Ok(());
                }
                Err(e) if !e.is_transient() => {
                    self.health.record_send_failure(self.signal);
                    warn!(sender = self.name, error = %e, "permanent send failure, dropping batch");
                    return Err(e);
                }
                Err(e) => {
                    self.health.record_send_failure(self.signal);
                    if attempt >= self.retry.max_attempts() {
                        warn!(sender = self.name, attempts = attempt, error = %e,
                            "send failed after retries, signaling disconnect");
                        self.conn.signal_disconnect();
                        return Err(e);
                    }
                }
            }
        }
    }

    /// One worker: pop batches off the queue, encode and send. Runs until
    /// the sender is cancelled or the queue closes and drains.
    pub async fn run_worker<T, F>(&self, queue: SharedReceiver<T>, encode: F)
    where
        F: Fn(&T) -> pb::StreamPayload,
    {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            if !self.is_ready() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(WORKER_IDLE_WAIT) => continue,
                }
            }
            let batch = tokio::select! {
                _ = self.cancel.cancelled() => return,
                batch = queue.recv() => match batch {
                    Some(batch) => batch,
                    None => return,
                },
            };
            // Failures are logged and counted inside; the batch is dropped.
            let _ = self.send_with_retry(encode(&batch)).await;
        }
    }

    #[cfg(test)]
    pub(crate) fn install_handle_for_test(
        &self,
    ) -> mpsc::Receiver<pb::StreamPayload> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        self.current.store(Some(Arc::new(StreamHandle { tx })));
        rx
    }

    #[cfg(test)]
    pub(crate) fn clear_handle_for_test(&self) {
        self.current.store(None);
    }
}
