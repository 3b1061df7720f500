// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Flat auth-log tailer.
//!
//! Reads new bytes of `/var/log/auth.log` since the previous tick, starting
//! at end-of-file on the first tick so history is not replayed. A shrinking
//! file is treated as a rotation and reading restarts from the top.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::SystemTime;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use crate::config::LogCollectionConfig;
use crate::model::{truncate_message, LogEntry};

use super::into_batches;

/// Default flat auth log path.
const AUTH_LOG_PATH: &str = "/var/log/auth.log";

/// Per-tick read ceiling; anything beyond waits for the next tick.
const MAX_READ_BYTES: u64 = 1 << 20;

pub struct SecurityCollector {
    path: PathBuf,
    batch_size: usize,
    message_max: usize,
    /// Byte offset of the next unread line; `None` until the first tick
    /// establishes the starting position.
    offset: Option<u64>,
}

impl SecurityCollector {
    pub fn new(config: &LogCollectionConfig) -> Self {
        SecurityCollector {
            path: PathBuf::from(AUTH_LOG_PATH),
            batch_size: config.batch_size,
            message_max: config.message_max,
            offset: None,
        }
    }

    #[cfg(test)]
    fn with_path(config: &LogCollectionConfig, path: PathBuf) -> Self {
        SecurityCollector {
            path,
            ..SecurityCollector::new(config)
        }
    }

    pub async fn collect(
        &mut self,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Vec<LogEntry>>> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            // A missing auth log is normal on many systems.
            Err(_) => return Ok(Vec::new()),
        };

        let offset = match self.offset {
            // First tick: remember the end and start tailing from there.
            None => {
                self.offset = Some(len);
                return Ok(Vec::new());
            }
            // Rotation or truncation: start over from the top.
            Some(offset) if offset > len => 0,
            Some(offset) => offset,
        };
        if offset == len {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let to_read = (len - offset).min(MAX_READ_BYTES);
        let mut buf = vec![0u8; to_read as usize];
        file.read_exact(&mut buf).await?;

        // Only complete lines are consumed; a partial tail stays for the
        // next tick.
        let consumed = match buf.iter().rposition(|&b| b == b'\n') {
            Some(newline) => newline + 1,
            None => return Ok(Vec::new()),
        };
        self.offset = Some(offset + consumed as u64);

        let text = String::from_utf8_lossy(&buf[..consumed]);
        let entries: Vec<LogEntry> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.to_entry(line))
            .collect();

        Ok(into_batches(entries, self.batch_size))
    }

    fn to_entry(&self, line: &str) -> LogEntry {
        LogEntry {
            timestamp: Some(SystemTime::now()),
            observed_timestamp: Some(SystemTime::now()),
            severity_text: classify_severity(line).to_string(),
            body: truncate_message(line, self.message_max),
            source: "security".to_string(),
            category: "auth".to_string(),
            pid: extract_pid(line).unwrap_or(0),
            ..Default::default()
        }
    }
}

/// Severity heuristics for the auth log.
fn classify_severity(line: &str) -> &'static str {
    if line.contains("Failed password")
        || line.contains("authentication failure")
        || line.contains("Invalid user")
    {
        "warning"
    } else {
        "info"
    }
}

/// Extract the pid from the `prog[pid]:` token syslog writes.
fn extract_pid(line: &str) -> Option<u32> {
    let open = line.find('[')?;
    let close = line[open..].find(']')? + open;
    line[open + 1..close].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> LogCollectionConfig {
        LogCollectionConfig {
            batch_size: 2,
            message_max: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_tick_skips_history_then_tails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.log");
        std::fs::write(&path, "old line 1\nold line 2\n").unwrap();

        let mut collector = SecurityCollector::with_path(&config(), path.clone());
        let cancel = CancellationToken::new();

        // First tick establishes the offset and reports nothing.
        assert!(collector.collect(&cancel).await.unwrap().is_empty());

        // Appended lines are picked up on the next tick.
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("sshd[1234]: Failed password for root\n");
        contents.push_str("sshd[1234]: Accepted publickey for admin\n");
        std::fs::write(&path, &contents).unwrap();

        let batches = collector.collect(&cancel).await.unwrap();
        let entries: Vec<_> = batches.into_iter().flatten().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity_text, "warning");
        assert_eq!(entries[0].pid, 1234);
        assert_eq!(entries[1].severity_text, "info");

        // Nothing new, nothing reported.
        assert!(collector.collect(&cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_resets_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.log");
        std::fs::write(&path, "a long line of history\n").unwrap();

        let mut collector = SecurityCollector::with_path(&config(), path.clone());
        let cancel = CancellationToken::new();
        assert!(collector.collect(&cancel).await.unwrap().is_empty());

        // Rotate: replace with a shorter file.
        std::fs::write(&path, "fresh\n").unwrap();
        let batches = collector.collect(&cancel).await.unwrap();
        let entries: Vec<_> = batches.into_iter().flatten().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "fresh");
    }

    #[tokio::test]
    async fn test_partial_lines_wait_for_completion() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.log");
        std::fs::write(&path, "").unwrap();

        let mut collector = SecurityCollector::with_path(&config(), path.clone());
        let cancel = CancellationToken::new();
        assert!(collector.collect(&cancel).await.unwrap().is_empty());

        std::fs::write(&path, "incomplete without newline").unwrap();
        assert!(collector.collect(&cancel).await.unwrap().is_empty());

        std::fs::write(&path, "incomplete without newline\n").unwrap();
        let batches = collector.collect(&cancel).await.unwrap();
        assert_eq!(batches[0][0].body, "incomplete without newline");
    }

    #[test]
    fn test_extract_pid() {
        assert_eq!(
            extract_pid("Jan 1 sshd[4321]: Failed password"),
            Some(4321)
        );
        assert_eq!(extract_pid("no pid here"), None);
        assert_eq!(extract_pid("weird[]: brackets"), None);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut collector =
            SecurityCollector::with_path(&config(), PathBuf::from("/nonexistent/auth.log"));
        let cancel = CancellationToken::new();
        let batches = rt.block_on(collector.collect(&cancel)).unwrap();
        assert!(batches.is_empty());
    }
}
