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

use crate::protocol::{StoreReply, StoreRequest, decode, encode};
use protocosm_common::model::{ChangeEvent, StoreError};
use protocosm_db::ObjectStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, trace, warn};
use zmq::Socket;

pub(crate) fn transport(e: zmq::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn last_endpoint(socket: &Socket) -> Result<String, StoreError> {
    socket
        .get_last_endpoint()
        .map_err(transport)?
        .map_err(|_| StoreError::Transport("bound endpoint is not UTF-8".to_string()))
}

/// Serves one store to any number of `RemoteStore` clients: requests on a REP socket, and every
/// write committed through it announced on a PUB socket.
pub struct StoreServer {
    store: Arc<dyn ObjectStore>,
    rpc_socket: Socket,
    publish: Socket,
    rpc_endpoint: String,
    events_endpoint: String,
}

impl StoreServer {
    /// Bind both sockets. Endpoints may use a wildcard port (`tcp://127.0.0.1:*`); the endpoints
    /// actually bound are available from `rpc_endpoint` and `events_endpoint`.
    pub fn bind(
        context: &zmq::Context,
        store: Arc<dyn ObjectStore>,
        rpc_endpoint: &str,
        events_endpoint: &str,
    ) -> Result<Self, StoreError> {
        let rpc_socket = context.socket(zmq::REP).map_err(transport)?;
        rpc_socket.set_linger(0).map_err(transport)?;
        rpc_socket.bind(rpc_endpoint).map_err(transport)?;
        let publish = context.socket(zmq::PUB).map_err(transport)?;
        publish.set_linger(0).map_err(transport)?;
        publish.bind(events_endpoint).map_err(transport)?;
        let rpc_endpoint = last_endpoint(&rpc_socket)?;
        let events_endpoint = last_endpoint(&publish)?;
        Ok(Self {
            store,
            rpc_socket,
            publish,
            rpc_endpoint,
            events_endpoint,
        })
    }

    pub fn rpc_endpoint(&self) -> &str {
        &self.rpc_endpoint
    }

    pub fn events_endpoint(&self) -> &str {
        &self.events_endpoint
    }

    /// Answer requests until `kill_switch` is set.
    pub fn serve(self, kill_switch: Arc<AtomicBool>) -> Result<(), StoreError> {
        let live = self.store.subscribe()?;
        info!(
            rpc = self.rpc_endpoint,
            events = self.events_endpoint,
            "Store server listening"
        );
        loop {
            if kill_switch.load(Ordering::Relaxed) {
                info!("Kill switch activated, store server exiting");
                return Ok(());
            }
            for event in live.try_iter() {
                self.announce(&event);
            }

            let ready = self.rpc_socket.poll(zmq::POLLIN, 10).map_err(transport)?;
            if ready == 0 {
                continue;
            }
            let request = match self.rpc_socket.recv_bytes(0) {
                Ok(request) => request,
                Err(e) => {
                    info!(error = %e, "Request socket closed, exiting");
                    return Ok(());
                }
            };
            let reply = match decode::<StoreRequest>(&request) {
                Ok(request) => {
                    trace!(?request, "Store request");
                    request.apply(self.store.as_ref())
                }
                Err(e) => {
                    warn!(error = %e, "Undecodable store request");
                    StoreReply::Failed(e)
                }
            };
            let payload = encode(&reply).or_else(|e| encode(&StoreReply::Failed(e)))?;
            self.rpc_socket.send(payload, 0).map_err(transport)?;
        }
    }

    fn announce(&self, event: &ChangeEvent) {
        let payload = match encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, sequence = event.sequence, "Could not encode change event");
                return;
            }
        };
        if let Err(e) = self.publish.send(payload, 0) {
            warn!(error = %e, sequence = event.sequence, "Could not publish change event");
        }
    }
}
