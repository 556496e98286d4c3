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

//! Two clients of one store server behave like two processes sharing a world.

use protocosm_common::model::{ChangeEvent, DocumentPatch, ObjectDocument, StoreError};
use protocosm_db::{DatabaseConfig, FeedConfig, FjallStore, ObjectStore, watch};
use protocosm_rpc::{RemoteStore, RpcConfig, StoreServer};
use protocosm_var::{Obj, v_int};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct Running {
    rpc: RpcConfig,
    kill_switch: Arc<AtomicBool>,
    jh: Option<JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

impl Running {
    fn client(&self) -> Arc<RemoteStore> {
        Arc::new(RemoteStore::new(zmq::Context::new(), self.rpc.clone()))
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.kill_switch.store(true, Ordering::SeqCst);
        if let Some(jh) = self.jh.take() {
            jh.join().unwrap();
        }
    }
}

fn serve() -> Running {
    let dir = tempfile::tempdir().unwrap();
    let (store, _) = FjallStore::open(dir.path(), &DatabaseConfig::default()).unwrap();
    let server = StoreServer::bind(
        &zmq::Context::new(),
        Arc::new(store),
        "tcp://127.0.0.1:*",
        "tcp://127.0.0.1:*",
    )
    .unwrap();
    let rpc = RpcConfig {
        rpc_endpoint: server.rpc_endpoint().to_string(),
        events_endpoint: server.events_endpoint().to_string(),
        request_timeout: Duration::from_secs(2),
    };
    let kill_switch = Arc::new(AtomicBool::new(false));
    let ks = kill_switch.clone();
    let jh = std::thread::spawn(move || server.serve(ks).unwrap());
    Running {
        rpc,
        kill_switch,
        jh: Some(jh),
        _dir: dir,
    }
}

fn doc(id: i64) -> ObjectDocument {
    ObjectDocument::new(Obj::mk_id(id), Obj::mk_id(1))
}

fn wait_until<F: Fn() -> bool>(what: &str, f: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !f() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_clients_share_one_store() {
    let server = serve();
    let a = server.client();
    let b = server.client();

    a.create(doc(5).with_property("hp", v_int(1))).unwrap();
    assert_eq!(
        b.create(doc(5)).unwrap_err(),
        StoreError::AlreadyExists(Obj::mk_id(5))
    );
    b.update(
        Obj::mk_id(5),
        DocumentPatch::default().with_property("hp", v_int(2)),
    )
    .unwrap();
    let got = a.get(Obj::mk_id(5)).unwrap().unwrap();
    assert_eq!(got.properties.get("hp"), Some(&v_int(2)));
    assert!(a.get(Obj::mk_id(6)).unwrap().is_none());

    a.create(doc(6)).unwrap();
    b.recycle(Obj::mk_id(6)).unwrap();
    assert_eq!(a.next_id().unwrap(), Obj::mk_id(6));
    assert_eq!(b.list_all(false).unwrap().len(), 1);
    assert_eq!(b.get_children(Obj::mk_id(1)).unwrap().len(), 1);
    assert_eq!(
        a.update(Obj::mk_id(99), DocumentPatch::default())
            .unwrap_err(),
        StoreError::NotFound(Obj::mk_id(99))
    );
    assert_eq!(a.latest_sequence().unwrap(), 4);
    assert_eq!(b.changes_since(2, 10).unwrap().len(), 2);
}

#[test]
fn test_watcher_sees_other_clients_writes() {
    let server = serve();
    let writer = server.client();
    let reader = server.client();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let feed = FeedConfig {
        poll_interval: Duration::from_millis(20),
        ..FeedConfig::default()
    };
    let _watcher = watch(reader.clone(), feed, move |e: ChangeEvent| {
        recorded.lock().unwrap().push((e.sequence, e.document_id));
    })
    .unwrap();

    writer.create(doc(7)).unwrap();
    writer.delete(Obj::mk_id(7)).unwrap();
    wait_until("two events", || seen.lock().unwrap().len() == 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(1, Obj::mk_id(7)), (2, Obj::mk_id(7))]
    );
}

#[test]
fn test_live_events_are_announced() {
    let server = serve();
    let writer = server.client();
    let listener = server.client();
    let rx = listener.subscribe().unwrap();
    // A SUB socket only sees what is published after it connects.
    std::thread::sleep(Duration::from_millis(200));
    writer.create(doc(3)).unwrap();
    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.document_id, Obj::mk_id(3));
    assert_eq!(event.sequence, 1);
}

#[test]
fn test_unreachable_server_is_a_transport_error() {
    let rpc = RpcConfig {
        // Nothing listens on the discard port.
        rpc_endpoint: "tcp://127.0.0.1:9".to_string(),
        events_endpoint: "tcp://127.0.0.1:9".to_string(),
        request_timeout: Duration::from_millis(100),
    };
    let store = RemoteStore::new(zmq::Context::new(), rpc);
    assert!(matches!(
        store.get(Obj::mk_id(1)),
        Err(StoreError::Transport(_))
    ));
    // The broken socket was discarded; the next call fails the same way rather than hanging.
    assert!(matches!(store.next_id(), Err(StoreError::Transport(_))));
}
