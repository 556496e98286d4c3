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

use crate::model::document::ObjectDocument;
use protocosm_var::Obj;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
    Replace,
    Delete,
}

/// One committed write, as observed on the change feed. Delivery is at-least-once, so consumers
/// must tolerate duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Position in the store's change log. Assigned at commit, strictly increasing, starting at 1.
    #[serde(default)]
    pub sequence: u64,
    pub operation: ChangeOperation,
    pub document_id: Obj,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_document: Option<ObjectDocument>,
}

impl ChangeEvent {
    pub fn new(operation: ChangeOperation, doc: &ObjectDocument) -> Self {
        Self {
            sequence: 0,
            operation,
            document_id: doc.id,
            full_document: Some(doc.clone()),
        }
    }

    pub fn deleted(id: Obj) -> Self {
        Self {
            sequence: 0,
            operation: ChangeOperation::Delete,
            document_id: id,
            full_document: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}
