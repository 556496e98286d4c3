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
use crate::feed::ChangeFeed;
use crate::provider::{Mutation, Provider};
use crate::provider::fjall_provider::FjallProvider;
use crate::provider::memory_provider::MemoryProvider;
use chrono::Utc;
use flume::Receiver;
use protocosm_common::model::{
    ChangeEvent, ChangeOperation, DocumentPatch, ObjectDocument, StoreError,
};
use protocosm_var::Obj;
use std::path::Path;
use tracing::debug;

/// The durable home of object documents, shared by every process attached to the same backend.
///
/// Writes are last-write-wins. Every committed write is appended to the backend's change log,
/// which is the durable, ordered feed other handles and processes tail.
pub trait ObjectStore: Send + Sync {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError>;

    /// Insert `doc`. If its identity names a recycled slot the slot is reused, keeping the original
    /// creation time. Fails with `AlreadyExists` if the identity is live.
    fn create(&self, doc: ObjectDocument) -> Result<ObjectDocument, StoreError>;

    /// Apply a partial update, stamping the modification time.
    fn update(&self, id: Obj, patch: DocumentPatch) -> Result<(), StoreError>;

    /// Permanently remove the document.
    fn delete(&self, id: Obj) -> Result<(), StoreError>;

    /// Soft-delete: the document stays addressable by identity but is excluded from normal
    /// traversal, and its identity becomes eligible for reuse.
    fn recycle(&self, id: Obj) -> Result<(), StoreError>;

    fn get_children(&self, parent: Obj) -> Result<Vec<ObjectDocument>, StoreError>;

    /// The lowest recycled identity, or one past the highest identity ever stored.
    fn next_id(&self) -> Result<Obj, StoreError>;

    fn list_all(&self, include_recycled: bool) -> Result<Vec<ObjectDocument>, StoreError>;

    /// A live stream of events for writes committed through this handle. The receiver disconnects
    /// if the subscription is lost. Writes made through other handles only appear in the log.
    fn subscribe(&self) -> Result<Receiver<ChangeEvent>, StoreError>;

    /// Logged events after sequence `after`, oldest first, at most `limit`.
    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError>;

    /// Sequence number of the newest logged event, or 0 for an empty log.
    fn latest_sequence(&self) -> Result<u64, StoreError>;
}

pub struct DocumentStore<P: Provider> {
    provider: P,
    feed: ChangeFeed,
}

pub type MemoryStore = DocumentStore<MemoryProvider>;
pub type FjallStore = DocumentStore<FjallProvider>;

impl<P: Provider> DocumentStore<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            feed: ChangeFeed::default(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn commit(&self, operation: ChangeOperation, doc: &ObjectDocument) -> Result<(), StoreError> {
        let event = self
            .provider
            .commit(Mutation::Put(doc), ChangeEvent::new(operation, doc))?;
        debug!(id = ?doc.id, %operation, sequence = event.sequence, "Committed document");
        self.feed.publish(event);
        Ok(())
    }
}

impl MemoryStore {
    pub fn new_in_memory() -> Self {
        Self::new(MemoryProvider::new())
    }
}

impl FjallStore {
    /// Open the store at `path`, returning whether it was freshly created. Opening a directory
    /// this process already has open yields a second handle onto the same keyspace.
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<(Self, bool), StoreError> {
        let (provider, fresh) = FjallProvider::open(path, config)?;
        Ok((Self::new(provider), fresh))
    }
}

impl<P: Provider> ObjectStore for DocumentStore<P> {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError> {
        self.provider.get(id)
    }

    fn create(&self, doc: ObjectDocument) -> Result<ObjectDocument, StoreError> {
        let _guard = self.provider.write_lock();
        match self.provider.get(doc.id)? {
            Some(existing) if !existing.recycled => Err(StoreError::AlreadyExists(doc.id)),
            Some(existing) => {
                let doc = ObjectDocument {
                    created: existing.created,
                    modified: Utc::now(),
                    recycled: false,
                    ..doc
                };
                self.commit(ChangeOperation::Replace, &doc)?;
                Ok(doc)
            }
            None => {
                self.commit(ChangeOperation::Insert, &doc)?;
                Ok(doc)
            }
        }
    }

    fn update(&self, id: Obj, patch: DocumentPatch) -> Result<(), StoreError> {
        let _guard = self.provider.write_lock();
        let Some(mut doc) = self.provider.get(id)? else {
            return Err(StoreError::NotFound(id));
        };
        patch.apply(&mut doc, Utc::now());
        self.commit(ChangeOperation::Update, &doc)
    }

    fn delete(&self, id: Obj) -> Result<(), StoreError> {
        let _guard = self.provider.write_lock();
        if self.provider.get(id)?.is_none() {
            return Err(StoreError::NotFound(id));
        }
        let event = self
            .provider
            .commit(Mutation::Delete(id), ChangeEvent::deleted(id))?;
        debug!(?id, sequence = event.sequence, "Deleted document");
        self.feed.publish(event);
        Ok(())
    }

    fn recycle(&self, id: Obj) -> Result<(), StoreError> {
        self.update(id, DocumentPatch::default().with_recycled(true))
    }

    fn get_children(&self, parent: Obj) -> Result<Vec<ObjectDocument>, StoreError> {
        self.provider
            .scan(&|d: &ObjectDocument| d.parent == parent && d.id != parent && !d.recycled)
    }

    fn next_id(&self) -> Result<Obj, StoreError> {
        let recycled = self.provider.scan(&|d: &ObjectDocument| d.recycled)?;
        if let Some(lowest_recycled) = recycled.iter().map(|d| d.id).min() {
            return Ok(lowest_recycled);
        }
        Ok(self
            .provider
            .max_id()?
            .map(|max| max.next())
            .unwrap_or(Obj::mk_id(0)))
    }

    fn list_all(&self, include_recycled: bool) -> Result<Vec<ObjectDocument>, StoreError> {
        self.provider
            .scan(&|d: &ObjectDocument| include_recycled || !d.recycled)
    }

    fn subscribe(&self) -> Result<Receiver<ChangeEvent>, StoreError> {
        self.provider.ping()?;
        Ok(self.feed.subscribe())
    }

    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        self.provider.changes_since(after, limit)
    }

    fn latest_sequence(&self) -> Result<u64, StoreError> {
        self.provider.latest_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use protocosm_common::model::ChangeOperation;
    use protocosm_var::{v_int, v_str};
    use std::time::Duration;

    fn doc(id: i64, parent: i64) -> ObjectDocument {
        ObjectDocument::new(Obj::mk_id(id), Obj::mk_id(parent))
    }

    #[test]
    fn test_create_then_get() {
        let store = MemoryStore::new_in_memory();
        store
            .create(doc(5, 1).with_property("name", v_str("lamp")))
            .unwrap();
        let got = store.get(Obj::mk_id(5)).unwrap().unwrap();
        assert_eq!(got.properties.get("name"), Some(&v_str("lamp")));
        assert!(store.get(Obj::mk_id(6)).unwrap().is_none());
    }

    #[test]
    fn test_create_live_identity_fails() {
        let store = MemoryStore::new_in_memory();
        store.create(doc(5, 1)).unwrap();
        assert_eq!(
            store.create(doc(5, 1)).unwrap_err(),
            StoreError::AlreadyExists(Obj::mk_id(5))
        );
    }

    #[test]
    fn test_next_id_prefers_lowest_recycled() {
        let store = MemoryStore::new_in_memory();
        assert_eq!(store.next_id().unwrap(), Obj::mk_id(0));
        for id in 0..10 {
            store.create(doc(id, 1)).unwrap();
        }
        assert_eq!(store.next_id().unwrap(), Obj::mk_id(10));
        store.recycle(Obj::mk_id(7)).unwrap();
        store.recycle(Obj::mk_id(4)).unwrap();
        assert_eq!(store.next_id().unwrap(), Obj::mk_id(4));
    }

    #[test]
    fn test_reuse_preserves_created() {
        let store = MemoryStore::new_in_memory();
        let original = store.create(doc(7, 1)).unwrap();
        store.recycle(Obj::mk_id(7)).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let reused = store
            .create(doc(7, 3).with_property("hp", v_int(10)))
            .unwrap();
        assert_eq!(reused.created, original.created);
        assert!(reused.modified > original.modified);
        assert!(!reused.recycled);
        assert_eq!(reused.parent, Obj::mk_id(3));
        assert_eq!(reused.properties.get("hp"), Some(&v_int(10)));
    }

    #[test]
    fn test_update_stamps_modified_and_is_last_write_wins() {
        let store = MemoryStore::new_in_memory();
        let original = store.create(doc(3, 1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        store
            .update(
                Obj::mk_id(3),
                DocumentPatch::default().with_property("hp", v_int(1)),
            )
            .unwrap();
        store
            .update(
                Obj::mk_id(3),
                DocumentPatch::default().with_property("hp", v_int(2)),
            )
            .unwrap();
        let got = store.get(Obj::mk_id(3)).unwrap().unwrap();
        assert_eq!(got.properties.get("hp"), Some(&v_int(2)));
        assert!(got.modified > original.modified);
        assert_eq!(
            store
                .update(Obj::mk_id(99), DocumentPatch::default())
                .unwrap_err(),
            StoreError::NotFound(Obj::mk_id(99))
        );
    }

    #[test]
    fn test_recycled_excluded_from_children_and_listing() {
        let store = MemoryStore::new_in_memory();
        store.create(doc(1, 0)).unwrap();
        store.create(doc(10, 1)).unwrap();
        store.create(doc(11, 1)).unwrap();
        store.create(doc(12, 10)).unwrap();
        store.recycle(Obj::mk_id(11)).unwrap();

        let children: Vec<_> = store
            .get_children(Obj::mk_id(1))
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(children, vec![Obj::mk_id(10)]);
        assert_eq!(store.list_all(false).unwrap().len(), 3);
        assert_eq!(store.list_all(true).unwrap().len(), 4);
        // Still addressable by identity.
        assert!(store.get(Obj::mk_id(11)).unwrap().unwrap().recycled);
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new_in_memory();
        store.create(doc(2, 1)).unwrap();
        store.delete(Obj::mk_id(2)).unwrap();
        assert!(store.get(Obj::mk_id(2)).unwrap().is_none());
        assert_eq!(
            store.delete(Obj::mk_id(2)).unwrap_err(),
            StoreError::NotFound(Obj::mk_id(2))
        );
    }

    #[test]
    fn test_feed_events_in_commit_order() {
        let store = MemoryStore::new_in_memory();
        let rx = store.subscribe().unwrap();
        store.create(doc(5, 1)).unwrap();
        store
            .update(
                Obj::mk_id(5),
                DocumentPatch::default().with_property("x", v_int(1)),
            )
            .unwrap();
        store.recycle(Obj::mk_id(5)).unwrap();
        store.create(doc(5, 1)).unwrap();
        store.delete(Obj::mk_id(5)).unwrap();

        let ops: Vec<_> = rx.drain().map(|e| e.operation).collect();
        assert_eq!(
            ops,
            vec![
                ChangeOperation::Insert,
                ChangeOperation::Update,
                ChangeOperation::Update,
                ChangeOperation::Replace,
                ChangeOperation::Delete,
            ]
        );
    }

    #[test]
    fn test_offline_provider_surfaces_transport_errors() {
        let store = MemoryStore::new_in_memory();
        store.provider().set_offline(true);
        assert!(matches!(
            store.get(Obj::mk_id(1)),
            Err(StoreError::Transport(_))
        ));
        assert!(matches!(store.subscribe(), Err(StoreError::Transport(_))));
        store.provider().set_offline(false);
        assert!(store.get(Obj::mk_id(1)).unwrap().is_none());
    }

    #[test]
    fn test_log_records_every_write_in_order() {
        let store = MemoryStore::new_in_memory();
        assert_eq!(store.latest_sequence().unwrap(), 0);
        store.create(doc(5, 1)).unwrap();
        store
            .update(
                Obj::mk_id(5),
                DocumentPatch::default().with_property("x", v_int(1)),
            )
            .unwrap();
        store.delete(Obj::mk_id(5)).unwrap();

        let log = store.changes_since(0, 10).unwrap();
        let seqs: Vec<_> = log.iter().map(|e| (e.sequence, e.operation)).collect();
        assert_eq!(
            seqs,
            vec![
                (1, ChangeOperation::Insert),
                (2, ChangeOperation::Update),
                (3, ChangeOperation::Delete),
            ]
        );
        assert_eq!(store.changes_since(2, 10).unwrap().len(), 1);
        assert_eq!(store.changes_since(0, 2).unwrap().len(), 2);
        assert_eq!(store.latest_sequence().unwrap(), 3);
    }

    #[test]
    fn test_fjall_handles_on_one_directory_see_each_other() {
        let tmpdir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::default();
        let (a, _) = FjallStore::open(tmpdir.path(), &config).unwrap();
        let (b, _) = FjallStore::open(tmpdir.path(), &config).unwrap();

        a.create(doc(5, 1)).unwrap();
        assert!(b.get(Obj::mk_id(5)).unwrap().is_some());
        assert_eq!(
            b.create(doc(5, 1)).unwrap_err(),
            StoreError::AlreadyExists(Obj::mk_id(5))
        );
        assert_eq!(b.next_id().unwrap(), Obj::mk_id(6));
        let log = b.changes_since(0, 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].document_id, Obj::mk_id(5));
    }
}
