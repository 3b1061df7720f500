// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Structured log collectors: journald (Linux), Event Viewer (Windows) and
//! the flat auth log.

#[cfg(windows)]
pub mod eventviewer;
#[cfg(unix)]
pub mod journald;
pub mod security;

use crate::model::LogEntry;

/// Split `entries` into batches of at most `batch_size`, preserving order.
pub(crate) fn into_batches(entries: Vec<LogEntry>, batch_size: usize) -> Vec<Vec<LogEntry>> {
    if entries.is_empty() {
        return Vec::new();
    }
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(entries.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size.min(entries.len()));
    for entry in entries {
        current.push(entry);
        if current.len() == batch_size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
