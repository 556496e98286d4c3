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

use protocosm_common::model::{ChangeEvent, ObjectDocument, StoreError};
use protocosm_var::Obj;
use std::sync::MutexGuard;

pub mod fjall_provider;
pub mod memory_provider;

/// A single document write, committed together with its change-log entry.
#[derive(Clone, Copy, Debug)]
pub enum Mutation<'a> {
    Put(&'a ObjectDocument),
    Delete(Obj),
}

impl Mutation<'_> {
    pub fn id(&self) -> Obj {
        match self {
            Mutation::Put(doc) => doc.id,
            Mutation::Delete(id) => *id,
        }
    }
}

/// Raw keyed storage of object documents plus their change log. Knows nothing of recycling or
/// identity allocation; `DocumentStore` layers those on top.
pub trait Provider: Send + Sync + 'static {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError>;

    /// Apply `mutation` and append `event` to the change log atomically. Returns the event with
    /// its assigned sequence number.
    fn commit(&self, mutation: Mutation<'_>, event: ChangeEvent)
    -> Result<ChangeEvent, StoreError>;

    /// Scan every stored document, returning those matching the predicate, in identity order.
    fn scan<F>(&self, predicate: &F) -> Result<Vec<ObjectDocument>, StoreError>
    where
        F: Fn(&ObjectDocument) -> bool;

    /// The highest identity holding a document, whether or not that document can be decoded.
    fn max_id(&self) -> Result<Option<Obj>, StoreError>;

    /// Logged events with a sequence number above `after`, oldest first, at most `limit`.
    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError>;

    /// Sequence number of the newest logged event, or 0 if nothing was ever committed.
    fn latest_sequence(&self) -> Result<u64, StoreError>;

    /// Serialises read-modify-write cycles across every handle sharing this backend.
    fn write_lock(&self) -> MutexGuard<'_, ()>;

    /// Fails if the backend cannot currently be reached.
    fn ping(&self) -> Result<(), StoreError>;
}
