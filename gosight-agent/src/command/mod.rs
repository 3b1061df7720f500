// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Remote command execution, answered in-band on the metrics stream.
//!
//! Shell commands run only when the program name is on the fixed
//! allow-list. Ansible commands write the payload to a temporary playbook
//! and hand it to `ansible-playbook`; the file is removed on every exit
//! path. Execution failures are returned in the response, never raised.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use gosight_protocol::pb;

use crate::sender::CommandHandler;

/// Programs the `shell` command type may execute.
pub const SHELL_ALLOW_LIST: [&str; 7] = [
    "docker",
    "podman",
    "systemctl",
    "ls",
    "uptime",
    "reboot",
    "shutdown",
];

/// Command types understood by the dispatcher.
const TYPE_SHELL: &str = "shell";
const TYPE_ANSIBLE: &str = "ansible";

pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn new() -> Self {
        CommandDispatcher
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        CommandDispatcher::new()
    }
}

#[async_trait]
impl CommandHandler for CommandDispatcher {
    async fn handle(&self, request: pb::CommandRequest) -> pb::CommandResponse {
        info!(
            command_type = %request.command_type,
            command = %request.command,
            "dispatching server command"
        );
        match request.command_type.as_str() {
            TYPE_SHELL => run_shell(&request.command, &request.args).await,
            TYPE_ANSIBLE => run_ansible(&request.command).await,
            other => {
                warn!(command_type = other, "unknown command type");
                failure("unknown command type".to_string())
            }
        }
    }
}

fn failure(error_message: String) -> pb::CommandResponse {
    pb::CommandResponse {
        success: false,
        output: String::new(),
        error_message,
    }
}

/// Combined stdout and stderr, the way an operator would see it.
fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

async fn run_shell(program: &str, args: &[String]) -> pb::CommandResponse {
    if !SHELL_ALLOW_LIST.contains(&program) {
        return failure(format!(
            "command '{program}' is not allowed; allowed commands: {}",
            SHELL_ALLOW_LIST.join(", ")
        ));
    }

    match Command::new(program).args(args).output().await {
        Ok(output) => pb::CommandResponse {
            success: output.status.success(),
            output: combined_output(&output),
            error_message: if output.status.success() {
                String::new()
            } else {
                format!("exited with {}", output.status)
            },
        },
        Err(e) => failure(format!("failed to run '{program}': {e}")),
    }
}

async fn run_ansible(playbook: &str) -> pb::CommandResponse {
    let filename = format!(
        "gosight-playbook-{}.yml",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let path = std::env::temp_dir().join(filename);
    run_ansible_at(playbook, &path).await
}

/// Write the playbook to `path` (0644), run it, and remove the file on all
/// exit paths.
async fn run_ansible_at(playbook: &str, path: &Path) -> pb::CommandResponse {
    if let Err(e) = write_playbook(playbook, path).await {
        return failure(format!("failed to write playbook: {e}"));
    }

    let result = Command::new("ansible-playbook").arg(path).output().await;

    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove playbook file");
    }

    match result {
        Ok(output) => pb::CommandResponse {
            success: output.status.success(),
            output: combined_output(&output),
            error_message: if output.status.success() {
                String::new()
            } else {
                format!("exited with {}", output.status)
            },
        },
        Err(e) => failure(format!("failed to run ansible-playbook: {e}")),
    }
}

async fn write_playbook(playbook: &str, path: &Path) -> std::io::Result<()> {
    tokio::fs::write(path, playbook).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await?;
    }
    Ok(())
}
