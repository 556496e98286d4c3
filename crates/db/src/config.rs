// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use fjall::PartitionCreateOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name of the fjall partition object documents live in.
    pub partition: String,
    /// Name of the fjall partition holding the change log.
    pub change_log_partition: String,
    /// Number of change-log entries kept for watchers that fall behind. `None` keeps everything.
    pub change_log_retention: Option<u64>,
    /// Fsync the journal after every committed write.
    pub sync_writes: bool,
    /// Various fjall partition creation options.
    /// Refer to the fjall documentation for more information.
    pub max_memtable_size: Option<u32>,
    pub block_size: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            partition: "objects".to_string(),
            change_log_partition: "changes".to_string(),
            change_log_retention: Some(100_000),
            sync_writes: true,
            max_memtable_size: None,
            block_size: None,
        }
    }
}

impl DatabaseConfig {
    pub fn partition_options(&self) -> PartitionCreateOptions {
        let mut opts = PartitionCreateOptions::default();
        if let Some(max_memtable_size) = self.max_memtable_size {
            opts = opts.max_memtable_size(max_memtable_size);
        }
        if let Some(block_size) = self.block_size {
            opts = opts.block_size(block_size);
        }
        opts
    }
}

/// Tuning for the change-feed watcher.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    /// How often the watcher reads the change log when no live event wakes it earlier.
    pub poll_interval: Duration,
    /// Most change-log entries read per poll.
    pub batch_size: usize,
    /// Delay before the first reconnect attempt; doubles on each consecutive failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            batch_size: 256,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl FeedConfig {
    pub fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_backoff)
    }
}
