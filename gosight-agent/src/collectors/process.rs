// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sysinfo::{PidExt, ProcessExt, System, SystemExt, UserExt};

use crate::model::{ProcessInfo, ProcessSnapshot};

/// Snapshots the full process table once per tick.
pub struct ProcessCollector {
    sys: System,
}

impl ProcessCollector {
    pub fn new() -> Self {
        ProcessCollector { sys: System::new() }
    }

    pub fn collect(&mut self) -> anyhow::Result<ProcessSnapshot> {
        self.sys.refresh_processes();
        self.sys.refresh_memory();
        self.sys.refresh_users_list();

        let total_memory = self.sys.total_memory();
        let users = self.sys.users();
        let user_name = |uid: &sysinfo::Uid| {
            users
                .iter()
                .find(|user| user.id() == uid)
                .map(|user| user.name().to_string())
        };

        let mut processes = Vec::with_capacity(self.sys.processes().len());
        for (pid, process) in self.sys.processes() {
            let mem_percent = if total_memory > 0 {
                process.memory() as f64 / total_memory as f64 * 100.0
            } else {
                0.0
            };
            processes.push(ProcessInfo {
                pid: pid.as_u32(),
                ppid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                user: process
                    .user_id()
                    .and_then(user_name)
                    .unwrap_or_default(),
                executable: process.exe().display().to_string(),
                cmdline: process.cmd().join(" "),
                cpu_percent: process.cpu_usage() as f64,
                mem_percent,
                // Thread counts are not portably available; reported as 0.
                threads: 0,
                start_time: Some(UNIX_EPOCH + Duration::from_secs(process.start_time())),
                tags: HashMap::new(),
            });
        }
        // A stable order keeps payload diffs readable server-side.
        processes.sort_unstable_by_key(|p| p.pid);

        Ok(ProcessSnapshot {
            timestamp: Some(SystemTime::now()),
            processes,
        })
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        ProcessCollector::new()
    }
}
