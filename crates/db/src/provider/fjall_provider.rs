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

use crate::config::DatabaseConfig;
use crate::provider::{Mutation, Provider};
use fjall::{Keyspace, PartitionHandle, PersistMode, UserValue};
use lazy_static::lazy_static;
use protocosm_common::model::{ChangeEvent, ObjectDocument, StoreError};
use protocosm_var::Obj;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

/// Change-log trimming runs once per this many commits.
const TRIM_INTERVAL: u64 = 64;

lazy_static! {
    /// Keyspaces currently open in this process, by directory and partition. A fjall keyspace
    /// must not be opened twice, so every handle on the same directory shares one.
    static ref OPEN_BACKENDS: Mutex<HashMap<(PathBuf, String), Weak<Backend>>> =
        Mutex::new(HashMap::new());
}

struct Backend {
    keyspace: Keyspace,
    objects: PartitionHandle,
    changes: PartitionHandle,
    sequence: AtomicU64,
    write_lock: Mutex<()>,
    sync_writes: bool,
    retention: Option<u64>,
}

/// Documents in one fjall partition, keyed by big-endian identity with the document as JSON, and
/// the change log in a second partition keyed by big-endian sequence number.
pub struct FjallProvider {
    backend: Arc<Backend>,
}

fn transport(e: fjall::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn decode_document(value: UserValue) -> Result<ObjectDocument, StoreError> {
    let bytes: &[u8] = value.as_ref();
    serde_json::from_slice(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn decode_event(value: UserValue) -> Result<ChangeEvent, StoreError> {
    let bytes: &[u8] = value.as_ref();
    serde_json::from_slice(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn sequence_from_key(bytes: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

impl FjallProvider {
    /// Open (or create) the keyspace at `path`, or join it if this process already has it open.
    /// Also returns whether the object partition was freshly created.
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<(Self, bool), StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Transport(e.to_string()))?;
        let canonical = path
            .canonicalize()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let key = (canonical, config.partition.clone());

        let mut open = OPEN_BACKENDS.lock().unwrap();
        if let Some(backend) = open.get(&key).and_then(Weak::upgrade) {
            debug!(?path, partition = config.partition, "Joined already open object store");
            return Ok((Self { backend }, false));
        }

        let keyspace = fjall::Config::new(path).open().map_err(transport)?;
        let fresh = !keyspace.partition_exists(&config.partition);
        let objects = keyspace
            .open_partition(&config.partition, config.partition_options())
            .map_err(transport)?;
        let changes = keyspace
            .open_partition(&config.change_log_partition, config.partition_options())
            .map_err(transport)?;
        let sequence = match changes.last_key_value().map_err(transport)? {
            Some((key, _)) => sequence_from_key(key.as_ref()).unwrap_or(0),
            None => 0,
        };
        info!(?path, partition = config.partition, fresh, sequence, "Opened object store");

        let backend = Arc::new(Backend {
            keyspace,
            objects,
            changes,
            sequence: AtomicU64::new(sequence),
            write_lock: Mutex::new(()),
            sync_writes: config.sync_writes,
            retention: config.change_log_retention,
        });
        open.retain(|_, backend| backend.strong_count() > 0);
        open.insert(key, Arc::downgrade(&backend));
        Ok((Self { backend }, fresh))
    }

    fn persist(&self) -> Result<(), StoreError> {
        if self.backend.sync_writes {
            self.backend
                .keyspace
                .persist(PersistMode::SyncAll)
                .map_err(transport)?;
        }
        Ok(())
    }

    /// Drop log entries older than the retention window.
    fn trim(&self, latest: u64) -> Result<(), StoreError> {
        let Some(retention) = self.backend.retention else {
            return Ok(());
        };
        if latest % TRIM_INTERVAL != 0 || latest <= retention {
            return Ok(());
        }
        let cutoff = (latest - retention + 1).to_be_bytes();
        let mut expired = Vec::new();
        for entry in self.backend.changes.range(..&cutoff[..]) {
            let (key, _) = entry.map_err(transport)?;
            expired.push(key);
        }
        if expired.is_empty() {
            return Ok(());
        }
        let count = expired.len();
        let mut batch = self.backend.keyspace.batch();
        for key in expired {
            batch.remove(&self.backend.changes, key);
        }
        batch.commit().map_err(transport)?;
        debug!(count, latest, "Trimmed change log");
        Ok(())
    }
}

impl Provider for FjallProvider {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError> {
        let Some(value) = self.backend.objects.get(id.as_key()).map_err(transport)? else {
            return Ok(None);
        };
        decode_document(value).map(Some)
    }

    fn commit(
        &self,
        mutation: Mutation<'_>,
        event: ChangeEvent,
    ) -> Result<ChangeEvent, StoreError> {
        let backend = &self.backend;
        let sequence = backend.sequence.load(Ordering::SeqCst) + 1;
        let event = event.with_sequence(sequence);

        let mut batch = backend.keyspace.batch();
        let key = mutation.id().as_key();
        match mutation {
            Mutation::Put(doc) => batch.insert(&backend.objects, &key[..], encode(doc)?),
            Mutation::Delete(_) => batch.remove(&backend.objects, &key[..]),
        }
        batch.insert(&backend.changes, &sequence.to_be_bytes()[..], encode(&event)?);
        batch.commit().map_err(transport)?;
        backend.sequence.store(sequence, Ordering::SeqCst);

        self.persist()?;
        self.trim(sequence)?;
        Ok(event)
    }

    fn scan<F>(&self, predicate: &F) -> Result<Vec<ObjectDocument>, StoreError>
    where
        F: Fn(&ObjectDocument) -> bool,
    {
        let mut result = Vec::new();
        for entry in self.backend.objects.iter() {
            let (key, value) = entry.map_err(transport)?;
            let doc = match decode_document(value) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(key = ?Obj::from_key(key.as_ref()), error = %e, "Skipping undecodable document");
                    continue;
                }
            };
            if predicate(&doc) {
                result.push(doc);
            }
        }
        Ok(result)
    }

    fn max_id(&self) -> Result<Option<Obj>, StoreError> {
        let mut max = None;
        for key in self.backend.objects.keys() {
            let key = key.map_err(transport)?;
            if let Some(id) = Obj::from_key(key.as_ref()) {
                max = max.max(Some(id));
            }
        }
        Ok(max)
    }

    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        let Some(from) = after.checked_add(1) else {
            return Ok(vec![]);
        };
        let from = from.to_be_bytes();
        let mut events = Vec::new();
        for entry in self.backend.changes.range(&from[..]..).take(limit) {
            let (_, value) = entry.map_err(transport)?;
            events.push(decode_event(value)?);
        }
        Ok(events)
    }

    fn latest_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.backend.sequence.load(Ordering::SeqCst))
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.backend.write_lock.lock().unwrap()
    }

    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocosm_common::model::ChangeOperation;
    use protocosm_var::v_int;

    fn put(provider: &FjallProvider, doc: &ObjectDocument) -> ChangeEvent {
        provider
            .commit(
                Mutation::Put(doc),
                ChangeEvent::new(ChangeOperation::Insert, doc),
            )
            .unwrap()
    }

    #[test]
    fn test_documents_and_log_survive_reopen() {
        let tmpdir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::default();
        {
            let (provider, fresh) = FjallProvider::open(tmpdir.path(), &config).unwrap();
            assert!(fresh);
            let doc = ObjectDocument::new(Obj::mk_id(300), Obj::mk_id(1))
                .with_property("hp", v_int(50));
            assert_eq!(put(&provider, &doc).sequence, 1);
            put(&provider, &ObjectDocument::new(Obj::mk_id(12), Obj::mk_id(1)));
        }
        let (provider, fresh) = FjallProvider::open(tmpdir.path(), &config).unwrap();
        assert!(!fresh);
        let doc = provider.get(Obj::mk_id(300)).unwrap().unwrap();
        assert_eq!(doc.properties.get("hp"), Some(&v_int(50)));

        let ids: Vec<_> = provider.scan(&|_| true).unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![Obj::mk_id(12), Obj::mk_id(300)]);

        assert_eq!(provider.latest_sequence().unwrap(), 2);
        let deleted = provider
            .commit(
                Mutation::Delete(Obj::mk_id(12)),
                ChangeEvent::deleted(Obj::mk_id(12)),
            )
            .unwrap();
        assert_eq!(deleted.sequence, 3);
        assert!(provider.get(Obj::mk_id(12)).unwrap().is_none());

        let seqs: Vec<_> = provider
            .changes_since(1, 10)
            .unwrap()
            .iter()
            .map(|e| (e.sequence, e.document_id))
            .collect();
        assert_eq!(seqs, vec![(2, Obj::mk_id(12)), (3, Obj::mk_id(12))]);
    }

    #[test]
    fn test_second_open_in_process_shares_the_keyspace() {
        let tmpdir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::default();
        let (a, _) = FjallProvider::open(tmpdir.path(), &config).unwrap();
        let (b, fresh) = FjallProvider::open(tmpdir.path(), &config).unwrap();
        assert!(!fresh);
        put(&a, &ObjectDocument::new(Obj::mk_id(5), Obj::mk_id(1)));
        assert!(b.get(Obj::mk_id(5)).unwrap().is_some());
        assert_eq!(b.latest_sequence().unwrap(), 1);
        assert_eq!(b.changes_since(0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_max_id_counts_undecodable_documents() {
        let tmpdir = tempfile::tempdir().unwrap();
        let (provider, _) = FjallProvider::open(tmpdir.path(), &DatabaseConfig::default()).unwrap();
        put(&provider, &ObjectDocument::new(Obj::mk_id(3), Obj::mk_id(1)));
        provider
            .backend
            .objects
            .insert(&Obj::mk_id(9).as_key()[..], &b"not json"[..])
            .unwrap();
        assert_eq!(provider.scan(&|_| true).unwrap().len(), 1);
        assert_eq!(provider.max_id().unwrap(), Some(Obj::mk_id(9)));
    }

    #[test]
    fn test_change_log_is_trimmed_to_retention() {
        let tmpdir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            change_log_retention: Some(10),
            ..DatabaseConfig::default()
        };
        let (provider, _) = FjallProvider::open(tmpdir.path(), &config).unwrap();
        let doc = ObjectDocument::new(Obj::mk_id(1), Obj::mk_id(0));
        for _ in 0..TRIM_INTERVAL {
            put(&provider, &doc);
        }
        let remaining = provider.changes_since(0, 1000).unwrap();
        assert_eq!(remaining.len(), 10);
        assert_eq!(remaining[0].sequence, TRIM_INTERVAL - 9);
        assert_eq!(provider.latest_sequence().unwrap(), TRIM_INTERVAL);
    }
}
