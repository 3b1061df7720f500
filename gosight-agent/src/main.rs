// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use gosight_agent::agent::Agent;
use gosight_agent::config::Config;
use gosight_agent::error::AgentError;
use gosight_agent::meta::MetaBuilder;
use gosight_log::{LoggerConfig, LogLevel};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "gosight-agent", disable_version_flag = true)]
#[command(about = "Host-resident telemetry agent for GoSight collectors")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Print version information and exit.
    #[arg(long)]
    version: bool,
}

fn print_version() {
    println!(
        "gosight-agent {VERSION} (build {}, commit {})",
        option_env!("GOSIGHT_BUILD").unwrap_or("unknown"),
        option_env!("GOSIGHT_COMMIT").unwrap_or("unknown"),
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.version {
        print_version();
        return;
    }
    if let Err(e) = run(cli).await {
        eprintln!("gosight-agent: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AgentError> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;

    let level: LogLevel = config
        .logs
        .log_level
        .parse()
        .map_err(|e: String| AgentError::Logger(std::io::Error::other(e)))?;
    let logger_config = LoggerConfig {
        app_log_file: config.logs.app_log_file.clone(),
        error_log_file: config.logs.error_log_file.clone(),
        access_log_file: config.logs.access_log_file.clone(),
        debug_log_file: config.logs.debug_log_file.clone(),
        level,
        stderr: config.logs.app_log_file.is_none(),
    };
    let _logger_guard = gosight_log::init(&logger_config).map_err(AgentError::Logger)?;

    let id_path = gosight_common::identity::default_state_path();
    let agent_id =
        gosight_common::identity::load_or_create(&id_path).map_err(AgentError::Identity)?;

    let meta = Arc::new(MetaBuilder::build(
        &config,
        &HashMap::new(),
        &agent_id,
        VERSION,
    ));
    info!(
        agent_id = %agent_id,
        hostname = %meta.hostname,
        endpoint_id = %meta.endpoint_id,
        server = %config.agent.server_url,
        config = %config_path.display(),
        "starting gosight-agent"
    );

    let agent = Agent::new(&config, meta)?;
    let cancel = agent.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        cancel.cancel();
    });

    agent.run().await;
    info!("agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
