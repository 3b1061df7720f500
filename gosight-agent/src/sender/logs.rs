// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Unary OTLP log sender.
//!
//! Logs leave over `LogsService::Export` on the shared channel rather than
//! a dedicated stream, so there is no stream state to maintain: each worker
//! builds the export request and calls the unary client with its own
//! timeout, honoring the shared pause deadline and the worker retry
//! schedule.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_client::LogsServiceClient;
use tokio_util::sync::CancellationToken;
use tonic::codec::CompressionEncoding;
use tracing::{debug, warn};

use crate::health::{Health, Signal};
use crate::model::LogPayload;
use crate::queue::SharedReceiver;
use crate::sender::connection::{ConnectionManager, MAX_MESSAGE_SIZE};
use crate::sender::otlp;
use crate::sender::retry::{self, RetryStrategy};
use crate::sender::stream::SendError;

/// Per-request budget for the unary export.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct LogsSender {
    conn: Arc<ConnectionManager>,
    health: Arc<Health>,
    retry: RetryStrategy,
    cancel: CancellationToken,
}

impl LogsSender {
    pub fn new(
        conn: Arc<ConnectionManager>,
        health: Arc<Health>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(LogsSender {
            conn,
            health,
            retry: RetryStrategy::default(),
            cancel,
        })
    }

    /// One worker: pop log payloads and export them until cancelled or the
    /// queue closes.
    pub async fn run_worker(&self, queue: SharedReceiver<LogPayload>) {
        loop {
            let payload = tokio::select! {
                _ = self.cancel.cancelled() => return,
                payload = queue.recv() => match payload {
                    Some(payload) => payload,
                    None => return,
                },
            };
            let _ = self.send_with_retry(&payload).await;
        }
    }

    /// Export one payload, retrying transient failures on the worker
    /// schedule; a final failure signals the disconnect broadcast and the
    /// batch is dropped.
    pub async fn send_with_retry(&self, payload: &LogPayload) -> Result<(), SendError> {
        match self.export(payload).await {
            Ok(()) => {
                self.health.record_sent(Signal::Logs);
                return Ok(());
            }
            Err(e) if !e.is_transient() => {
                self.health.record_send_failure(Signal::Logs);
                warn!(error = %e, "permanent log export failure, dropping batch");
                return Err(e);
            }
            Err(e) => {
                self.health.record_send_failure(Signal::Logs);
                debug!(error = %e, "transient log export failure, retrying");
            }
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.retry.delay(attempt).await;
            match self.export(payload).await {
                Ok(()) => {
                    self.health.record_sent(Signal::Logs);
                    return Ok(());
                }
                Err(e) if !e.is_transient() => {
                    self.health.record_send_failure(Signal::Logs);
                    warn!(error = %e, "permanent log export failure, dropping batch");
                    return Err(e);
                }
                Err(e) => {
                    self.health.record_send_failure(Signal::Logs);
                    if attempt >= self.retry.max_attempts() {
                        warn!(attempts = attempt, error = %e,
                            "log export failed after retries, signaling disconnect");
                        self.conn.signal_disconnect();
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn export(&self, payload: &LogPayload) -> Result<(), SendError> {
        // A global pause applies to the unary path too.
        self.conn.wait_for_resume().await;

        let channel = self
            .conn
            .get_conn()
            .await
            .map_err(|e| SendError::Status(tonic::Status::unavailable(e.to_string())))?;
        let mut client = LogsServiceClient::new(channel)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);

        let request = otlp::to_export_request(payload);
        match tokio::time::timeout(EXPORT_TIMEOUT, client.export(request)).await {
            Err(_) => Err(SendError::Timeout),
            Ok(Err(status)) => {
                if retry::is_transient(status.code()) {
                    // The channel may be dead; drop it so the next attempt
                    // re-dials through the manager.
                    self.conn.close().await;
                }
                Err(SendError::Status(status))
            }
            Ok(Ok(response)) => {
                if let Some(partial) = response.into_inner().partial_success {
                    if partial.rejected_log_records > 0 {
                        warn!(
                            rejected = partial.rejected_log_records,
                            message = %partial.error_message,
                            "collector rejected part of a log export"
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
