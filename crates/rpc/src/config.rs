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

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Where the store server answers requests.
    pub rpc_endpoint: String,
    /// Where the store server announces committed writes.
    pub events_endpoint: String,
    /// How long a client waits for a reply before treating the server as unreachable.
    pub request_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "tcp://127.0.0.1:7899".to_string(),
            events_endpoint: "tcp://127.0.0.1:7898".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}
