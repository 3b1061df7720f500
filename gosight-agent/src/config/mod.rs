// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration: YAML file, environment overrides, CLI precedence.
//!
//! Resolution order for the file path: `--config` flag, then the
//! `GOSIGHT_AGENT_CONFIG` environment variable, then `./config/config.yaml`.
//! Environment overrides are applied after the file is loaded; CLI flags
//! trump both. Unknown override keys are simply never read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AgentError, ConfigErrorKind};
use gosight_common::tag;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GOSIGHT_AGENT_CONFIG";

/// Fallback configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "./config/config.yaml";

/// Queue capacity used when a collection block does not set one.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

fn default_interval() -> u64 {
    30
}

fn default_workers() -> usize {
    2
}

fn default_batch_size() -> usize {
    100
}

fn default_buffer_size() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_message_max() -> usize {
    8192
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub ca_file: Option<String>,
    /// Optional client certificate; together with `key_file` enables mTLS.
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogsConfig {
    pub error_log_file: Option<String>,
    pub app_log_file: Option<String>,
    pub access_log_file: Option<String>,
    pub debug_log_file: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        LogsConfig {
            error_log_file: None,
            app_log_file: None,
            access_log_file: None,
            debug_log_file: None,
            log_level: default_log_level(),
        }
    }
}

/// A container runtime endpoint (docker or podman).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeSocketConfig {
    pub socket: Option<String>,
    pub enabled: bool,
}

/// Cadence and worker-pool sizing shared by the metric, process and trace
/// collection blocks.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    /// Tick interval in seconds; falls back to `agent.interval`.
    pub interval: Option<u64>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            interval: None,
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogCollectionConfig {
    /// Enabled log sources, a subset of `{journald, eventviewer, security}`.
    pub sources: Vec<String>,
    /// Unit filter for journald.
    pub services: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum log body length before truncation; 0 disables it.
    #[serde(default = "default_message_max")]
    pub message_max: usize,
    pub cursor_file: Option<String>,
    /// Tick interval in seconds; falls back to `agent.interval`.
    pub interval: Option<u64>,
}

impl Default for LogCollectionConfig {
    fn default() -> Self {
        LogCollectionConfig {
            sources: Vec::new(),
            services: Vec::new(),
            batch_size: default_batch_size(),
            buffer_size: default_buffer_size(),
            workers: default_workers(),
            message_max: default_message_max(),
            cursor_file: None,
            interval: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSection {
    /// `host:port` of the collector.
    pub server_url: String,
    /// Default tick interval in seconds.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Hostname override.
    pub host: Option<String>,
    pub environment: String,
    /// Enabled metric collectors, a subset of
    /// `{cpu, mem, disk, host, net, podman, docker}`.
    pub metrics_enabled: Vec<String>,
    pub log_collection: LogCollectionConfig,
    pub metric_collection: CollectionConfig,
    pub process_collection: CollectionConfig,
    pub trace_collection: CollectionConfig,
}

impl Default for AgentSection {
    fn default() -> Self {
        AgentSection {
            server_url: String::new(),
            interval: default_interval(),
            host: None,
            environment: String::new(),
            metrics_enabled: Vec::new(),
            log_collection: LogCollectionConfig::default(),
            metric_collection: CollectionConfig::default(),
            process_collection: CollectionConfig::default(),
            trace_collection: CollectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tls: TlsConfig,
    pub logs: LogsConfig,
    pub podman: RuntimeSocketConfig,
    pub docker: RuntimeSocketConfig,
    pub custom_tags: HashMap<String, String>,
    pub agent: AgentSection,
}

impl Config {
    /// Resolve the configuration file path: CLI flag, env var, default.
    pub fn resolve_path(flag: Option<&Path>) -> PathBuf {
        if let Some(path) = flag {
            return path.to_path_buf();
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Load and parse the YAML file at `path`, then apply environment
    /// overrides from the process environment.
    pub fn load(path: &Path) -> Result<Config, AgentError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(ConfigErrorKind::Read(path.display().to_string(), e))
        })?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `GOSIGHT_*` environment overrides through `lookup`. Unknown
    /// keys in the environment are ignored; malformed values for known keys
    /// are logged and skipped.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GOSIGHT_SERVER_URL") {
            self.agent.server_url = v;
        }
        if let Some(v) = lookup("GOSIGHT_INTERVAL") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.agent.interval = secs,
                _ => warn!(value = %v, "ignoring invalid GOSIGHT_INTERVAL"),
            }
        }
        if let Some(v) = lookup("GOSIGHT_HOST") {
            self.agent.host = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_METRICS") {
            self.agent.metrics_enabled = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("GOSIGHT_ENVIRONMENT") {
            self.agent.environment = v;
        }
        if let Some(v) = lookup("GOSIGHT_APP_LOG_FILE") {
            self.logs.app_log_file = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_ERROR_LOG_FILE") {
            self.logs.error_log_file = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_ACCESS_LOG_FILE") {
            self.logs.access_log_file = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_LOG_LEVEL") {
            self.logs.log_level = v;
        }
        if let Some(v) = lookup("GOSIGHT_TLS_CA_FILE") {
            self.tls.ca_file = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_TLS_CERT_FILE") {
            self.tls.cert_file = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_TLS_KEY_FILE") {
            self.tls.key_file = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_PODMAN_SOCKET") {
            self.podman.socket = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_DOCKER_SOCKET") {
            self.docker.socket = Some(v);
        }
        if let Some(v) = lookup("GOSIGHT_CUSTOM_TAGS") {
            let (tags, err) = tag::parse_tags(&v);
            if let Some(err) = err {
                warn!(error = %err, "GOSIGHT_CUSTOM_TAGS partially parsed");
            }
            for (k, val) in tags {
                self.custom_tags.insert(k, val);
            }
        }
    }

    /// Startup validation of the options the pipelines cannot default.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent.server_url.is_empty() {
            return Err(AgentError::Config(ConfigErrorKind::Invalid(
                "agent.server_url is required".to_string(),
            )));
        }
        if self.tls.cert_file.is_some() != self.tls.key_file.is_some() {
            return Err(AgentError::Config(ConfigErrorKind::Invalid(
                "tls.cert_file and tls.key_file must be set together".to_string(),
            )));
        }
        Ok(())
    }

    pub fn metric_interval(&self) -> Duration {
        Duration::from_secs(
            self.agent
                .metric_collection
                .interval
                .unwrap_or(self.agent.interval),
        )
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(
            self.agent
                .log_collection
                .interval
                .unwrap_or(self.agent.interval),
        )
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(
            self.agent
                .process_collection
                .interval
                .unwrap_or(self.agent.interval),
        )
    }
}
