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

use crate::config::RpcConfig;
use crate::protocol::{StoreReply, StoreRequest, decode, encode};
use crate::server::transport;
use flume::{Receiver, Sender};
use protocosm_common::model::{ChangeEvent, DocumentPatch, ObjectDocument, StoreError};
use protocosm_db::ObjectStore;
use protocosm_var::Obj;
use std::sync::Mutex;
use tracing::{debug, warn};
use zmq::Socket;

/// An `ObjectStore` living in another process, reached through its `StoreServer`.
///
/// Each call is a blocking request/reply exchange. A request that fails or times out discards the
/// socket, and the next call connects afresh.
pub struct RemoteStore {
    context: zmq::Context,
    config: RpcConfig,
    request_socket: Mutex<Option<Socket>>,
}

fn unexpected(reply: StoreReply) -> StoreError {
    StoreError::Transport(format!("unexpected reply from store server: {reply:?}"))
}

impl RemoteStore {
    pub fn new(context: zmq::Context, config: RpcConfig) -> Self {
        Self {
            context,
            config,
            request_socket: Mutex::new(None),
        }
    }

    fn connect(&self) -> Result<Socket, StoreError> {
        let timeout = i32::try_from(self.config.request_timeout.as_millis()).unwrap_or(i32::MAX);
        let socket = self.context.socket(zmq::REQ).map_err(transport)?;
        socket.set_rcvtimeo(timeout).map_err(transport)?;
        socket.set_sndtimeo(timeout).map_err(transport)?;
        socket.set_linger(0).map_err(transport)?;
        socket
            .connect(&self.config.rpc_endpoint)
            .map_err(transport)?;
        debug!(endpoint = self.config.rpc_endpoint, "Connected to store server");
        Ok(socket)
    }

    fn call(&self, request: StoreRequest) -> Result<StoreReply, StoreError> {
        let payload = encode(&request)?;
        let mut slot = self.request_socket.lock().unwrap();
        let socket = match slot.take() {
            Some(socket) => socket,
            None => self.connect()?,
        };
        socket.send(payload, 0).map_err(transport)?;
        let reply = socket.recv_bytes(0).map_err(|e| {
            StoreError::Transport(format!(
                "no reply from store server at {}: {e}",
                self.config.rpc_endpoint
            ))
        })?;
        *slot = Some(socket);
        match decode::<StoreReply>(&reply)? {
            StoreReply::Failed(e) => Err(e),
            reply => Ok(reply),
        }
    }
}

impl ObjectStore for RemoteStore {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError> {
        match self.call(StoreRequest::Get { id })? {
            StoreReply::Document(doc) => Ok(doc),
            other => Err(unexpected(other)),
        }
    }

    fn create(&self, doc: ObjectDocument) -> Result<ObjectDocument, StoreError> {
        match self.call(StoreRequest::Create { doc })? {
            StoreReply::Created(doc) => Ok(doc),
            other => Err(unexpected(other)),
        }
    }

    fn update(&self, id: Obj, patch: DocumentPatch) -> Result<(), StoreError> {
        match self.call(StoreRequest::Update { id, patch })? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn delete(&self, id: Obj) -> Result<(), StoreError> {
        match self.call(StoreRequest::Delete { id })? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn recycle(&self, id: Obj) -> Result<(), StoreError> {
        match self.call(StoreRequest::Recycle { id })? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn get_children(&self, parent: Obj) -> Result<Vec<ObjectDocument>, StoreError> {
        match self.call(StoreRequest::GetChildren { parent })? {
            StoreReply::Documents(docs) => Ok(docs),
            other => Err(unexpected(other)),
        }
    }

    fn next_id(&self) -> Result<Obj, StoreError> {
        match self.call(StoreRequest::NextId)? {
            StoreReply::Id(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    fn list_all(&self, include_recycled: bool) -> Result<Vec<ObjectDocument>, StoreError> {
        match self.call(StoreRequest::ListAll { include_recycled })? {
            StoreReply::Documents(docs) => Ok(docs),
            other => Err(unexpected(other)),
        }
    }

    /// Events the server announces for writes committed through it, from any client.
    fn subscribe(&self) -> Result<Receiver<ChangeEvent>, StoreError> {
        self.call(StoreRequest::Ping)?;
        let socket = self.context.socket(zmq::SUB).map_err(transport)?;
        socket.set_subscribe(b"").map_err(transport)?;
        socket
            .connect(&self.config.events_endpoint)
            .map_err(transport)?;
        let (tx, rx) = flume::unbounded();
        std::thread::Builder::new()
            .name("protocosm-rpc-events".to_string())
            .spawn(move || forward_events(socket, tx))
            .map_err(|e| StoreError::Transport(format!("could not spawn event reader: {e}")))?;
        Ok(rx)
    }

    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        match self.call(StoreRequest::ChangesSince { after, limit })? {
            StoreReply::Changes(events) => Ok(events),
            other => Err(unexpected(other)),
        }
    }

    fn latest_sequence(&self) -> Result<u64, StoreError> {
        match self.call(StoreRequest::LatestSequence)? {
            StoreReply::Sequence(sequence) => Ok(sequence),
            other => Err(unexpected(other)),
        }
    }
}

/// Relay announced events until the receiving side goes away.
fn forward_events(socket: Socket, tx: Sender<ChangeEvent>) {
    while !tx.is_disconnected() {
        match socket.poll(zmq::POLLIN, 100) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Event subscription failed");
                return;
            }
        }
        let payload = match socket.recv_bytes(0) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Event subscription closed");
                return;
            }
        };
        match decode::<ChangeEvent>(&payload) {
            Ok(event) => {
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(e) => warn!(error = %e, "Undecodable change event"),
        }
    }
}
