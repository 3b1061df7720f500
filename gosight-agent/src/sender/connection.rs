// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Shared gRPC connection manager.
//!
//! One manager per agent owns the single `Channel` all senders share, the
//! global pause deadline, and the disconnect broadcast. The manager never
//! retries: dialing errors are reported to the caller and retry policy stays
//! with the senders.

use std::error::Error;
use std::fmt::Display;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::{debug, info};

use crate::config::Config;

/// HTTP/2 keepalive ping interval.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(120);

/// How long to wait for a keepalive ack before declaring the link dead.
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(20);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Generous per-stream and per-connection flow-control windows.
const INITIAL_WINDOW_SIZE: u32 = 8 * 1024 * 1024;

/// Per-direction gRPC message cap applied by every signal client.
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

/// How far a forced disconnect pushes the shared pause deadline, so all
/// senders re-enter dial together instead of stampeding.
const DISCONNECT_PAUSE: Duration = Duration::from_secs(5);

/// Represents the errors raised when establishing the shared connection.
#[derive(Debug)]
pub enum ConnectionError {
    /// The configured server URL does not parse.
    InvalidUri(String),
    /// TLS material (CA, client cert or key) could not be read.
    TlsMaterial(std::io::Error),
    /// The transport failed to configure or dial.
    Transport(tonic::transport::Error),
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::InvalidUri(msg) => write!(f, "invalid server url: {msg}"),
            ConnectionError::TlsMaterial(e) => write!(f, "cannot read TLS material: {e}"),
            ConnectionError::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl Error for ConnectionError {}

impl From<tonic::transport::Error> for ConnectionError {
    fn from(value: tonic::transport::Error) -> Self {
        ConnectionError::Transport(value)
    }
}

/// Connection settings extracted from the agent config.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// `host:port` of the collector.
    pub server_url: String,
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

impl ConnectionConfig {
    pub fn from_config(config: &Config) -> Self {
        ConnectionConfig {
            server_url: config.agent.server_url.clone(),
            ca_file: config.tls.ca_file.clone(),
            cert_file: config.tls.cert_file.clone(),
            key_file: config.tls.key_file.clone(),
        }
    }
}

fn poisoned_recover<T>(result: Result<T, std::sync::PoisonError<T>>) -> T {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ConnectionManager {
    config: ConnectionConfig,
    channel: tokio::sync::Mutex<Option<Channel>>,
    pause_until: std::sync::Mutex<Instant>,
    disconnect: broadcast::Sender<()>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let (disconnect, _) = broadcast::channel(8);
        ConnectionManager {
            config,
            channel: tokio::sync::Mutex::new(None),
            pause_until: std::sync::Mutex::new(Instant::now()),
            disconnect,
        }
    }

    /// Return the shared channel, dialing lazily on first use. Safe for
    /// concurrent use; at most one live channel exists at a time.
    pub async fn get_conn(&self) -> Result<Channel, ConnectionError> {
        let mut guard = self.channel.lock().await;
        if let Some(channel) = guard.as_ref() {
            return Ok(channel.clone());
        }
        let endpoint = self.build_endpoint().await?;
        debug!(server = %self.config.server_url, "dialing collector");
        let channel = endpoint.connect().await?;
        info!(server = %self.config.server_url, "connected to collector");
        *guard = Some(channel.clone());
        Ok(channel)
    }

    async fn build_endpoint(&self) -> Result<Endpoint, ConnectionError> {
        let scheme = if self.config.ca_file.is_some() {
            "https"
        } else {
            "http"
        };
        let url = format!("{scheme}://{}", self.config.server_url);
        let mut endpoint = Endpoint::from_shared(url)
            .map_err(|e| ConnectionError::InvalidUri(e.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(Some(TCP_KEEPALIVE))
            .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
            .keep_alive_timeout(KEEPALIVE_TIMEOUT)
            .keep_alive_while_idle(true)
            .initial_stream_window_size(INITIAL_WINDOW_SIZE)
            .initial_connection_window_size(INITIAL_WINDOW_SIZE);

        if let Some(ca_file) = &self.config.ca_file {
            let ca = tokio::fs::read(ca_file)
                .await
                .map_err(ConnectionError::TlsMaterial)?;
            let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca));
            if let (Some(cert_file), Some(key_file)) =
                (&self.config.cert_file, &self.config.key_file)
            {
                let cert = tokio::fs::read(cert_file)
                    .await
                    .map_err(ConnectionError::TlsMaterial)?;
                let key = tokio::fs::read(key_file)
                    .await
                    .map_err(ConnectionError::TlsMaterial)?;
                tls = tls.identity(Identity::from_pem(cert, key));
            }
            endpoint = endpoint.tls_config(tls)?;
        }
        Ok(endpoint)
    }

    /// Drop the shared channel; the next `get_conn` dials again. Idempotent.
    pub async fn close(&self) {
        self.channel.lock().await.take();
    }

    pub fn pause_until(&self) -> Instant {
        *poisoned_recover(self.pause_until.lock())
    }

    /// Advance the shared pause deadline. The deadline is monotonically
    /// non-decreasing within a run; an earlier instant is ignored.
    pub fn set_pause(&self, until: Instant) {
        let mut guard = poisoned_recover(self.pause_until.lock());
        if until > *guard {
            *guard = until;
        }
    }

    /// Sleep until the shared pause deadline has passed.
    pub async fn wait_for_resume(&self) {
        let until = self.pause_until();
        if until > Instant::now() {
            tokio::time::sleep_until(until).await;
        }
    }

    pub fn subscribe_disconnect(&self) -> broadcast::Receiver<()> {
        self.disconnect.subscribe()
    }

    /// Tear all senders down together: advance the pause deadline and wake
    /// every disconnect subscriber.
    pub fn signal_disconnect(&self) {
        self.set_pause(Instant::now() + DISCONNECT_PAUSE);
        // Send fails only when nobody subscribes, which is fine.
        let _ = self.disconnect.send(());
    }
}
