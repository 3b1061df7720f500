// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

/// Open `path` for appending and wrap it in a non-blocking writer.
///
/// Parent directories are created if missing. The returned guard must be
/// kept alive for the writer thread to keep draining.
pub(crate) fn file_writer(path: &str) -> io::Result<(NonBlocking, WorkerGuard)> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    Ok(tracing_appender::non_blocking(file))
}
