// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::fmt::Display;

use crate::sender::connection::ConnectionError;

/// Represents the different kinds of configuration errors.
#[derive(Debug)]
pub enum ConfigErrorKind {
    /// The configuration file could not be read. The associated `String`
    /// contains the path that was tried.
    Read(String, std::io::Error),
    /// The configuration file could not be parsed.
    Parse(serde_yaml::Error),
    /// A required option is missing or invalid.
    Invalid(String),
}

impl Display for ConfigErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigErrorKind::Read(path, e) => write!(f, "cannot read config '{path}': {e}"),
            ConfigErrorKind::Parse(e) => write!(f, "cannot parse config: {e}"),
            ConfigErrorKind::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

/// AgentError holds the fatal error kinds that abort agent startup.
///
/// Everything recoverable (collector probes, transient sends) stays inside
/// the pipelines and never surfaces here.
#[derive(Debug)]
pub enum AgentError {
    /// Configuration loading or validation failed.
    Config(ConfigErrorKind),
    /// The agent identity file could not be created or read.
    Identity(std::io::Error),
    /// Logger initialization failed.
    Logger(std::io::Error),
    /// The gRPC connection could not be configured (bad URL, unreadable TLS
    /// material). Dial failures at runtime are retried, not surfaced here.
    Connection(ConnectionError),
}

impl Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Config(e) => Display::fmt(e, f),
            AgentError::Identity(e) => write!(f, "agent identity: {e}"),
            AgentError::Logger(e) => write!(f, "logger init: {e}"),
            AgentError::Connection(e) => Display::fmt(e, f),
        }
    }
}

impl Error for AgentError {}

impl From<ConnectionError> for AgentError {
    fn from(value: ConnectionError) -> Self {
        AgentError::Connection(value)
    }
}

impl From<serde_yaml::Error> for AgentError {
    fn from(value: serde_yaml::Error) -> Self {
        AgentError::Config(ConfigErrorKind::Parse(value))
    }
}
