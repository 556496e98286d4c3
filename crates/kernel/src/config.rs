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

//! Kernel configuration, loaded by the host binary and shared by every component of a running
//! object manager.

use protocosm_common::model::Privilege;
use protocosm_db::FeedConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Hops a parent-chain walk may take before the chain is treated as cyclic.
    pub max_parent_depth: usize,
    /// How deeply method calls may nest before raising `E_MAXREC`.
    pub max_call_depth: usize,
    /// Instructions a method runs before yielding the thread to other tasks.
    pub tick_slice: usize,
    /// Load every live object into the cache at startup.
    pub preload_on_start: bool,
    /// Oldest recycle-bin snapshots are dropped past this many. Unbounded if unset.
    pub recycle_bin_limit: Option<usize>,
    /// Privilege method code runs with, and the minimum needed to edit method source.
    pub method_privilege: Privilege,
    pub feed: FeedConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_parent_depth: 64,
            max_call_depth: 64,
            tick_slice: 10_000,
            preload_on_start: false,
            recycle_bin_limit: None,
            method_privilege: Privilege::Builder,
            feed: FeedConfig::default(),
        }
    }
}
