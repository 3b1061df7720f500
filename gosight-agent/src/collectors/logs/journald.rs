// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! journald adapter reading `journalctl --output=json` after a persisted
//! cursor, so restarts resume where the previous run stopped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LogCollectionConfig;
use crate::model::{truncate_message, LogEntry, LogMeta};

use super::into_batches;

/// Ceiling on entries consumed per tick, as a multiple of the batch size,
/// so a journal burst cannot monopolize a tick.
const MAX_BATCHES_PER_TICK: usize = 10;

pub struct JournaldCollector {
    services: Vec<String>,
    batch_size: usize,
    message_max: usize,
    cursor_file: Option<PathBuf>,
    cursor: Option<String>,
}

impl JournaldCollector {
    pub fn new(config: &LogCollectionConfig) -> Self {
        let cursor_file = config.cursor_file.as_ref().map(PathBuf::from);
        let cursor = cursor_file
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        JournaldCollector {
            services: config.services.clone(),
            batch_size: config.batch_size,
            message_max: config.message_max,
            cursor_file,
            cursor,
        }
    }

    pub async fn collect(
        &mut self,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Vec<LogEntry>>> {
        let mut cmd = Command::new("journalctl");
        cmd.arg("--output=json").arg("--no-pager").arg("-q");
        match &self.cursor {
            Some(cursor) => {
                cmd.arg(format!("--after-cursor={cursor}"));
            }
            // First run without a cursor: start from recent history only.
            None => {
                cmd.arg("--lines=100");
            }
        }
        for service in &self.services {
            cmd.arg("-u").arg(service);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        cmd.kill_on_drop(true);

        let output = tokio::select! {
            _ = cancel.cancelled() => return Ok(Vec::new()),
            result = cmd.output() => result?,
        };
        if !output.status.success() {
            anyhow::bail!("journalctl exited with {}", output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let limit = self.batch_size.max(1) * MAX_BATCHES_PER_TICK;
        let mut entries = Vec::new();
        let mut last_cursor = None;

        for line in stdout.lines().take(limit) {
            let record: Value = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    debug!(error = %e, "skipping unparsable journal line");
                    continue;
                }
            };
            if let Some(cursor) = record.get("__CURSOR").and_then(Value::as_str) {
                last_cursor = Some(cursor.to_string());
            }
            entries.push(self.to_entry(&record));
        }

        if let Some(cursor) = last_cursor {
            self.persist_cursor(&cursor);
            self.cursor = Some(cursor);
        }

        Ok(into_batches(entries, self.batch_size))
    }

    fn to_entry(&self, record: &Value) -> LogEntry {
        let str_field = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let body = truncate_message(&str_field("MESSAGE"), self.message_max);
        let unit = str_field("_SYSTEMD_UNIT");
        let pid = record
            .get("_PID")
            .and_then(Value::as_str)
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(0);
        let timestamp = record
            .get("__REALTIME_TIMESTAMP")
            .and_then(Value::as_str)
            .and_then(|usec| usec.parse::<u64>().ok())
            .map(|usec| UNIX_EPOCH + Duration::from_micros(usec));

        let mut entry = LogEntry {
            timestamp,
            observed_timestamp: Some(SystemTime::now()),
            severity_text: priority_to_severity(str_field("PRIORITY").as_str()).to_string(),
            body,
            source: "journald".to_string(),
            category: if unit.is_empty() {
                "system".to_string()
            } else {
                unit.clone()
            },
            pid,
            ..Default::default()
        };
        if !unit.is_empty() {
            entry.fields.insert("unit".to_string(), unit.clone());
        }
        let executable = str_field("_EXE");
        let user = str_field("_UID");
        entry.meta = Some(LogMeta {
            unit,
            executable,
            user,
            ..Default::default()
        });
        entry
    }

    fn persist_cursor(&self, cursor: &str) {
        if let Some(path) = &self.cursor_file {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(path, cursor) {
                warn!(path = %path.display(), error = %e, "failed to persist journal cursor");
            }
        }
    }
}

/// Map a syslog priority (0..7) to the canonical severity names.
fn priority_to_severity(priority: &str) -> &'static str {
    match priority {
        "0" => "fatal",
        "1" | "2" => "critical",
        "3" => "error",
        "4" => "warning",
        "5" => "notice",
        "6" => "info",
        "7" => "debug",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn collector_with(config_mutator: impl FnOnce(&mut LogCollectionConfig)) -> JournaldCollector {
        let mut config = LogCollectionConfig::default();
        config_mutator(&mut config);
        JournaldCollector::new(&config)
    }

    #[test]
    fn test_priority_mapping_is_total() {
        for p in ["0", "1", "2", "3", "4", "5", "6", "7", "8", "junk", ""] {
            let severity = priority_to_severity(p);
            assert!(!severity.is_empty());
        }
        assert_eq!(priority_to_severity("3"), "error");
        assert_eq!(priority_to_severity("6"), "info");
        assert_eq!(priority_to_severity("junk"), "unknown");
    }

    #[test]
    fn test_to_entry_parses_journal_record() {
        let collector = collector_with(|c| c.message_max = 0);
        let record: Value = serde_json::from_str(
            r#"{"MESSAGE":"Accepted publickey for root",
                "PRIORITY":"6",
                "_PID":"4242",
                "_SYSTEMD_UNIT":"ssh.service",
                "__REALTIME_TIMESTAMP":"1700000000000000",
                "__CURSOR":"s=abc"}"#,
        )
        .unwrap();
        let entry = collector.to_entry(&record);
        assert_eq!(entry.body, "Accepted publickey for root");
        assert_eq!(entry.severity_text, "info");
        assert_eq!(entry.pid, 4242);
        assert_eq!(entry.source, "journald");
        assert_eq!(entry.category, "ssh.service");
        assert_eq!(entry.fields.get("unit").unwrap(), "ssh.service");
        assert_eq!(
            entry.timestamp.unwrap(),
            UNIX_EPOCH + Duration::from_secs(1_700_000_000)
        );
        assert_eq!(entry.meta.as_ref().unwrap().unit, "ssh.service");
    }

    #[test]
    fn test_to_entry_truncates_long_messages() {
        let collector = collector_with(|c| c.message_max = 8);
        let record: Value =
            serde_json::from_str(r#"{"MESSAGE":"0123456789abcdef","PRIORITY":"6"}"#).unwrap();
        let entry = collector.to_entry(&record);
        assert_eq!(entry.body, "01234567 [truncated]");
    }

    #[test]
    fn test_cursor_is_loaded_and_trimmed() {
        let dir = TempDir::new().unwrap();
        let cursor_path = dir.path().join("cursor");
        std::fs::write(&cursor_path, "  s=deadbeef\n").unwrap();
        let collector = collector_with(|c| {
            c.cursor_file = Some(cursor_path.to_string_lossy().to_string());
        });
        assert_eq!(collector.cursor.as_deref(), Some("s=deadbeef"));
    }

    #[test]
    fn test_persist_cursor_round_trip() {
        let dir = TempDir::new().unwrap();
        let cursor_path = dir.path().join("state").join("cursor");
        let collector = collector_with(|c| {
            c.cursor_file = Some(cursor_path.to_string_lossy().to_string());
        });
        collector.persist_cursor("s=12345");
        assert_eq!(std::fs::read_to_string(&cursor_path).unwrap(), "s=12345");
    }
}
