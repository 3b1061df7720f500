// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! The agent object: composes the connection manager and the four runners
//! under one root cancellation scope.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::health::Health;
use crate::meta::Meta;
use crate::runner::{LogsRunner, MetricsRunner, ProcessesRunner, TraceIngest, TracesRunner};
use crate::sender::{ConnectionConfig, ConnectionManager};

/// Total shutdown must complete within this budget even when the network is
/// down; all waits inside are themselves bounded.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

/// Cadence of the health counter snapshot in the logs.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct Agent {
    cancel: CancellationToken,
    health: Arc<Health>,
    conn: Arc<ConnectionManager>,
    metrics: MetricsRunner,
    logs: LogsRunner,
    processes: ProcessesRunner,
    traces: TracesRunner,
    trace_ingest: TraceIngest,
}

impl Agent {
    pub fn new(config: &Config, base_meta: Arc<Meta>) -> Result<Self, AgentError> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let health = Arc::new(Health::new());
        let conn = Arc::new(ConnectionManager::new(ConnectionConfig::from_config(config)));
        let agent_start_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let metrics = MetricsRunner::new(
            config,
            Arc::clone(&base_meta),
            Arc::clone(&conn),
            Arc::clone(&health),
            &cancel,
            agent_start_unix,
        );
        let logs = LogsRunner::new(
            config,
            Arc::clone(&base_meta),
            Arc::clone(&conn),
            Arc::clone(&health),
            &cancel,
        );
        let processes = ProcessesRunner::new(
            config,
            Arc::clone(&base_meta),
            Arc::clone(&conn),
            Arc::clone(&health),
            &cancel,
        );
        let (traces, trace_ingest) =
            TracesRunner::new(config, Arc::clone(&conn), Arc::clone(&health), &cancel);

        Ok(Agent {
            cancel,
            health,
            conn,
            metrics,
            logs,
            processes,
            traces,
            trace_ingest,
        })
    }

    /// The root cancellation token; cancelling it shuts the agent down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle for an embedding OTLP receiver to feed traces through.
    pub fn trace_ingest(&self) -> TraceIngest {
        self.trace_ingest.clone()
    }

    pub fn health(&self) -> Arc<Health> {
        Arc::clone(&self.health)
    }

    /// Run all pipelines until the root token is cancelled, then shut down
    /// within the fixed budget.
    pub async fn run(self) {
        let Agent {
            cancel,
            health,
            conn,
            mut metrics,
            mut logs,
            mut processes,
            mut traces,
            trace_ingest,
        } = self;

        let mut handles = Vec::new();
        handles.push(tokio::spawn(async move {
            metrics.run().await;
            metrics.close().await;
        }));
        handles.push(tokio::spawn(async move {
            logs.run().await;
            logs.close().await;
        }));
        handles.push(tokio::spawn(async move {
            processes.run().await;
            processes.close().await;
        }));
        handles.push(tokio::spawn(async move {
            traces.run().await;
            traces.close().await;
        }));

        let health_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = health_cancel.cancelled() => return,
                    _ = ticker.tick() => health.log_snapshot(),
                }
            }
        }));

        info!("agent pipelines started");
        cancel.cancelled().await;
        info!("agent shutting down");
        // Closing the ingest handle lets the traces runner drain out.
        drop(trace_ingest);

        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
            conn.close().await;
        };
        if tokio::time::timeout(SHUTDOWN_BUDGET, drain).await.is_err() {
            warn!("shutdown budget exceeded, abandoning remaining tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaBuilder;
    use std::collections::HashMap;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.agent.server_url = "localhost:1".into();
        config.agent.metrics_enabled = vec!["cpu".into()];
        config
    }

    #[tokio::test]
    async fn test_new_requires_valid_config() {
        let config = Config::default();
        let meta = Arc::new(Meta::default());
        assert!(Agent::new(&config, meta).is_err());
    }

    #[tokio::test]
    async fn test_cancelled_agent_shuts_down_within_budget() {
        let config = test_config();
        let meta = Arc::new(MetaBuilder::build(
            &config,
            &HashMap::new(),
            "agent-test",
            "0.0.0",
        ));
        let agent = Agent::new(&config, meta).unwrap();
        let cancel = agent.cancellation_token();

        let run = tokio::spawn(agent.run());
        // Give the pipelines a moment to start, then cancel.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("agent did not stop within budget")
            .unwrap();
    }
}
