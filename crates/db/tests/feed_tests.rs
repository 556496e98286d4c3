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

//! The watcher tails the change log: it delivers writes from every handle in commit order and
//! replays what it missed while the backend was unreachable.

use flume::Receiver;
use protocosm_common::model::{
    ChangeEvent, ChangeOperation, DocumentPatch, ObjectDocument, StoreError,
};
use protocosm_db::{
    ChangeListener, DatabaseConfig, DocumentStore, FeedConfig, FjallStore, MemoryProvider,
    MemoryStore, ObjectStore, watch,
};
use protocosm_var::{Obj, v_int};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ChangeEvent>>,
    resyncs: AtomicUsize,
}

impl Recorder {
    fn ids(&self) -> Vec<Obj> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.document_id)
            .collect()
    }
}

struct Listener(Arc<Recorder>);

impl ChangeListener for Listener {
    fn on_change(&self, event: ChangeEvent) {
        self.0.events.lock().unwrap().push(event);
    }

    fn on_resync(&self) {
        self.0.resyncs.fetch_add(1, Ordering::SeqCst);
    }
}

/// A view of a store whose change log can be made unreachable while writes continue through the
/// underlying store.
struct Flaky {
    inner: Arc<dyn ObjectStore>,
    down: AtomicBool,
}

impl Flaky {
    fn new(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            down: AtomicBool::new(false),
        })
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("unreachable".to_string()));
        }
        Ok(())
    }
}

impl ObjectStore for Flaky {
    fn get(&self, id: Obj) -> Result<Option<ObjectDocument>, StoreError> {
        self.check()?;
        self.inner.get(id)
    }
    fn create(&self, doc: ObjectDocument) -> Result<ObjectDocument, StoreError> {
        self.check()?;
        self.inner.create(doc)
    }
    fn update(&self, id: Obj, patch: DocumentPatch) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update(id, patch)
    }
    fn delete(&self, id: Obj) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(id)
    }
    fn recycle(&self, id: Obj) -> Result<(), StoreError> {
        self.check()?;
        self.inner.recycle(id)
    }
    fn get_children(&self, parent: Obj) -> Result<Vec<ObjectDocument>, StoreError> {
        self.check()?;
        self.inner.get_children(parent)
    }
    fn next_id(&self) -> Result<Obj, StoreError> {
        self.check()?;
        self.inner.next_id()
    }
    fn list_all(&self, include_recycled: bool) -> Result<Vec<ObjectDocument>, StoreError> {
        self.check()?;
        self.inner.list_all(include_recycled)
    }
    fn subscribe(&self) -> Result<Receiver<ChangeEvent>, StoreError> {
        self.check()?;
        self.inner.subscribe()
    }
    fn changes_since(&self, after: u64, limit: usize) -> Result<Vec<ChangeEvent>, StoreError> {
        self.check()?;
        self.inner.changes_since(after, limit)
    }
    fn latest_sequence(&self) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.latest_sequence()
    }
}

fn fast_feed() -> FeedConfig {
    FeedConfig {
        poll_interval: Duration::from_millis(5),
        batch_size: 4,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

fn wait_until<F: Fn() -> bool>(what: &str, f: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !f() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn doc(id: i64) -> ObjectDocument {
    ObjectDocument::new(Obj::mk_id(id), Obj::mk_id(1))
}

#[test]
fn test_watch_delivers_events() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(store.clone(), fast_feed(), Listener(recorder.clone())).unwrap();

    store.create(doc(5)).unwrap();
    store
        .update(
            Obj::mk_id(5),
            DocumentPatch::default().with_property("hp", v_int(3)),
        )
        .unwrap();

    wait_until("two events", || recorder.events.lock().unwrap().len() == 2);
    let events = recorder.events.lock().unwrap();
    assert_eq!(events[0].operation, ChangeOperation::Insert);
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].document_id, Obj::mk_id(5));
    let full = events[1].full_document.as_ref().unwrap();
    assert_eq!(full.properties.get("hp"), Some(&v_int(3)));
    assert_eq!(recorder.resyncs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_writes_before_watch_are_not_replayed() {
    let store = Arc::new(MemoryStore::new_in_memory());
    store.create(doc(2)).unwrap();
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(store.clone(), fast_feed(), Listener(recorder.clone())).unwrap();
    store.create(doc(3)).unwrap();
    wait_until("one event", || !recorder.ids().is_empty());
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(recorder.ids(), vec![Obj::mk_id(3)]);
}

#[test]
fn test_backlog_larger_than_a_batch_arrives_in_order() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(store.clone(), fast_feed(), Listener(recorder.clone())).unwrap();
    for id in 10..21 {
        store.create(doc(id)).unwrap();
    }
    wait_until("eleven events", || recorder.ids().len() == 11);
    let expected: Vec<_> = (10..21).map(Obj::mk_id).collect();
    assert_eq!(recorder.ids(), expected);
}

#[test]
fn test_events_missed_while_unreachable_are_replayed() {
    let backend: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new_in_memory());
    let view = Flaky::new(backend.clone());
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(view.clone(), fast_feed(), Listener(recorder.clone())).unwrap();

    view.down.store(true, Ordering::SeqCst);
    for id in [4, 5, 6] {
        backend.create(doc(id)).unwrap();
    }
    std::thread::sleep(Duration::from_millis(50));
    assert!(recorder.ids().is_empty());

    view.down.store(false, Ordering::SeqCst);
    wait_until("replay", || recorder.ids().len() == 3);
    assert_eq!(
        recorder.ids(),
        vec![Obj::mk_id(4), Obj::mk_id(5), Obj::mk_id(6)]
    );
    // Nothing was lost, so nothing needs discarding.
    assert_eq!(recorder.resyncs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_trimmed_log_forces_resync() {
    let backend: Arc<dyn ObjectStore> =
        Arc::new(DocumentStore::new(MemoryProvider::with_retention(2)));
    let view = Flaky::new(backend.clone());
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(view.clone(), fast_feed(), Listener(recorder.clone())).unwrap();

    view.down.store(true, Ordering::SeqCst);
    for id in 1..=5 {
        backend.create(doc(id)).unwrap();
    }
    view.down.store(false, Ordering::SeqCst);

    wait_until("resync", || recorder.resyncs.load(Ordering::SeqCst) == 1);
    wait_until("tail of the log", || recorder.ids().len() == 2);
    assert_eq!(recorder.ids(), vec![Obj::mk_id(4), Obj::mk_id(5)]);
}

#[test]
fn test_unknown_starting_position_forces_resync() {
    let backend: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new_in_memory());
    let view = Flaky::new(backend.clone());
    view.down.store(true, Ordering::SeqCst);
    let recorder = Arc::new(Recorder::default());
    // Failures are absorbed, never returned.
    let _watcher = watch(view.clone(), fast_feed(), Listener(recorder.clone())).unwrap();
    backend.create(doc(7)).unwrap();
    std::thread::sleep(Duration::from_millis(30));

    view.down.store(false, Ordering::SeqCst);
    wait_until("resync", || recorder.resyncs.load(Ordering::SeqCst) == 1);
    backend.create(doc(8)).unwrap();
    wait_until("event after resync", || recorder.ids() == vec![Obj::mk_id(8)]);
}

#[test]
fn test_dropped_live_stream_falls_back_to_polling() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(store.clone(), fast_feed(), Listener(recorder.clone())).unwrap();

    store.feed().disconnect_all();
    store.create(doc(8)).unwrap();
    wait_until("event after disconnect", || {
        recorder.ids().contains(&Obj::mk_id(8))
    });
    wait_until("live stream re-established", || {
        store.feed().subscriber_count() == 1
    });
}

#[test]
fn test_second_handle_sees_writes_of_the_first() {
    let tmpdir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::default();
    let (a, _) = FjallStore::open(tmpdir.path(), &config).unwrap();
    let (b, _) = FjallStore::open(tmpdir.path(), &config).unwrap();
    let b = Arc::new(b);
    let recorder = Arc::new(Recorder::default());
    let _watcher = watch(b.clone(), fast_feed(), Listener(recorder.clone())).unwrap();

    a.create(doc(5)).unwrap();
    a.update(
        Obj::mk_id(5),
        DocumentPatch::default().with_property("hp", v_int(9)),
    )
    .unwrap();

    wait_until("events through the second handle", || {
        recorder.ids().len() == 2
    });
    let got = b.get(Obj::mk_id(5)).unwrap().unwrap();
    assert_eq!(got.properties.get("hp"), Some(&v_int(9)));
}

#[test]
fn test_stopping_watcher_releases_subscription() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let watcher = watch(store.clone(), fast_feed(), |_e: ChangeEvent| {}).unwrap();
    assert_eq!(store.feed().subscriber_count(), 1);
    watcher.stop();
    // The dropped receiver is pruned on the next publish.
    store.create(doc(1)).unwrap();
    assert_eq!(store.feed().subscriber_count(), 0);
}
