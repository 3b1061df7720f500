// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Windows Event Viewer adapter.
//!
//! The raw Event Log API lives outside the agent runtime; this adapter only
//! shapes whatever the platform probe hands over into the common batch form.
//! Until a probe is wired in it reports empty batches, keeping the registry
//! and pipeline behavior identical across platforms.

use tokio_util::sync::CancellationToken;

use crate::config::LogCollectionConfig;
use crate::model::LogEntry;

pub struct EventViewerCollector {
    #[allow(dead_code)]
    batch_size: usize,
    #[allow(dead_code)]
    message_max: usize,
}

impl EventViewerCollector {
    pub fn new(config: &LogCollectionConfig) -> Self {
        EventViewerCollector {
            batch_size: config.batch_size,
            message_max: config.message_max,
        }
    }

    pub async fn collect(
        &mut self,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Vec<LogEntry>>> {
        Ok(Vec::new())
    }
}
