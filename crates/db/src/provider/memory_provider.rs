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

use crate::provider::{Mutation, Provider};
use protocosm_common::model::{ChangeEvent, ObjectDocument, StoreError};
use protocosm_var::Obj;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};

#[derive(Default)]
struct Contents {
    documents: BTreeMap<Obj, ObjectDocument>,
    log: VecDeque<ChangeEvent>,
    sequence: u64,
}

/// Volatile provider for tests and single-process experiments. Can be switched offline to exercise
/// transport failure paths.
#[derive(Default)]
pub struct MemoryProvider {
    contents: RwLock<Contents>,
    retention: Option<usize>,
    write_lock: Mutex<()>,
    offline: AtomicBool,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retention` change-log entries, dropping the oldest.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention: Some(retention),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Provider for MemoryProvider {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError> {
        self.ping()?;
        Ok(self.contents.read().unwrap().documents.get(&id).cloned())
    }

    fn commit(
        &self,
        mutation: Mutation<'_>,
        event: ChangeEvent,
    ) -> Result<ChangeEvent, StoreError> {
        self.ping()?;
        let mut contents = self.contents.write().unwrap();
        match mutation {
            Mutation::Put(doc) => {
                contents.documents.insert(doc.id, doc.clone());
            }
            Mutation::Delete(id) => {
                contents.documents.remove(&id);
            }
        }
        contents.sequence += 1;
        let event = event.with_sequence(contents.sequence);
        contents.log.push_back(event.clone());
        if let Some(retention) = self.retention {
            while contents.log.len() > retention {
                contents.log.pop_front();
            }
        }
        Ok(event)
    }

    fn scan<F>(&self, predicate: &F) -> Result<Vec<ObjectDocument>, StoreError>
    where
        F: Fn(&ObjectDocument) -> bool,
    {
        self.ping()?;
        let contents = self.contents.read().unwrap();
        Ok(contents
            .documents
            .values()
            .filter(|d| predicate(d))
            .cloned()
            .collect())
    }

    fn max_id(&self) -> Result<Option<Obj>, StoreError> {
        self.ping()?;
        Ok(self.contents.read().unwrap().documents.keys().max().copied())
    }

    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        self.ping()?;
        let contents = self.contents.read().unwrap();
        Ok(contents
            .log
            .iter()
            .filter(|e| e.sequence > after)
            .take(limit)
            .cloned()
            .collect())
    }

    fn latest_sequence(&self) -> Result<u64, StoreError> {
        self.ping()?;
        Ok(self.contents.read().unwrap().sequence)
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap()
    }

    fn ping(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("memory provider is offline".to_string()));
        }
        Ok(())
    }
}
