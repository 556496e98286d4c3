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

//! Messages exchanged between `RemoteStore` and `StoreServer`, JSON-encoded, one per 0MQ frame.

use protocosm_common::model::{ChangeEvent, DocumentPatch, ObjectDocument, StoreError};
use protocosm_db::ObjectStore;
use protocosm_var::Obj;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreRequest {
    Get { id: Obj },
    Create { doc: ObjectDocument },
    Update { id: Obj, patch: DocumentPatch },
    Delete { id: Obj },
    Recycle { id: Obj },
    GetChildren { parent: Obj },
    NextId,
    ListAll { include_recycled: bool },
    ChangesSince { after: u64, limit: usize },
    LatestSequence,
    Ping,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreReply {
    Document(Option<ObjectDocument>),
    Created(ObjectDocument),
    Done,
    Documents(Vec<ObjectDocument>),
    Id(Obj),
    Changes(Vec<ChangeEvent>),
    Sequence(u64),
    Failed(StoreError),
}

impl StoreRequest {
    /// Perform the request against `store`. Store failures become `Failed` replies.
    pub fn apply(self, store: &dyn ObjectStore) -> StoreReply {
        let result = match self {
            StoreRequest::Get { id } => store.get(id).map(StoreReply::Document),
            StoreRequest::Create { doc } => store.create(doc).map(StoreReply::Created),
            StoreRequest::Update { id, patch } => store.update(id, patch).map(|_| StoreReply::Done),
            StoreRequest::Delete { id } => store.delete(id).map(|_| StoreReply::Done),
            StoreRequest::Recycle { id } => store.recycle(id).map(|_| StoreReply::Done),
            StoreRequest::GetChildren { parent } => {
                store.get_children(parent).map(StoreReply::Documents)
            }
            StoreRequest::NextId => store.next_id().map(StoreReply::Id),
            StoreRequest::ListAll { include_recycled } => {
                store.list_all(include_recycled).map(StoreReply::Documents)
            }
            StoreRequest::ChangesSince { after, limit } => {
                store.changes_since(after, limit).map(StoreReply::Changes)
            }
            StoreRequest::LatestSequence => store.latest_sequence().map(StoreReply::Sequence),
            StoreRequest::Ping => Ok(StoreReply::Done),
        };
        result.unwrap_or_else(StoreReply::Failed)
    }
}

pub(crate) fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(message).map_err(|e| StoreError::Encoding(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
}
