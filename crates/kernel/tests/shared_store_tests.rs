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

//! Managers standing in for separate server processes: each has its own store handle and learns
//! of the other's writes only from the change log.

mod support;

use pretty_assertions::assert_eq;
use protocosm_common::model::Privilege;
use protocosm_db::{DatabaseConfig, FjallStore};
use protocosm_kernel::{CreateSpec, ObjectManager};
use protocosm_rpc::{RemoteStore, RpcConfig, StoreServer};
use protocosm_var::{Obj, v_int, v_str};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use support::{eventually, start};

fn fjall_pair(dir: &tempfile::TempDir) -> (Arc<FjallStore>, Arc<FjallStore>) {
    let config = DatabaseConfig::default();
    let (a, _) = FjallStore::open(dir.path(), &config).unwrap();
    let (b, _) = FjallStore::open(dir.path(), &config).unwrap();
    (Arc::new(a), Arc::new(b))
}

async fn greets_with(manager: &Arc<ObjectManager>, id: Obj, expected: &str) -> bool {
    match manager.call(id, "greet", vec![], Privilege::Builder).await {
        Ok(v) => v == v_str(expected),
        Err(_) => false,
    }
}

/// Edit `greet` through `writer`; `reader`, which already ran the old version, must pick up the
/// new one.
async fn greet_update_scenario(writer: Arc<ObjectManager>, reader: Arc<ObjectManager>) {
    let greeter = writer
        .create(CreateSpec::default().with_method("greet", "return \"Hello\";"))
        .unwrap()
        .id();
    assert_eq!(
        reader
            .call(greeter, "greet", vec![], Privilege::Builder)
            .await
            .unwrap(),
        v_str("Hello")
    );

    let mut handle = writer.load(greeter).unwrap().unwrap();
    handle.set_method("greet", "return \"Howdy\";");
    handle.save().unwrap();

    eventually("new greeting", || {
        let reader = reader.clone();
        async move { greets_with(&reader, greeter, "Howdy").await.then_some(()) }
    })
    .await;
}

#[tokio::test]
async fn test_greet_update_across_fjall_handles() {
    let dir = tempfile::tempdir().unwrap();
    let (sa, sb) = fjall_pair(&dir);
    let a = start(&sa);
    let b = start(&sb);
    greet_update_scenario(a.clone(), b.clone()).await;
    a.shutdown();
    b.shutdown();
}

#[tokio::test]
async fn test_cascading_invalidation_across_fjall_handles() {
    let dir = tempfile::tempdir().unwrap();
    let (sa, sb) = fjall_pair(&dir);
    let a = start(&sa);
    let b = start(&sb);

    let p = a
        .create(CreateSpec::default().with_property("colour", v_str("red")))
        .unwrap()
        .id();
    let x = a.create(CreateSpec::new(p)).unwrap().id();
    let y = a.create(CreateSpec::new(x)).unwrap().id();
    let seen = b.load(y).unwrap().unwrap();
    assert_eq!(seen.get("colour").unwrap(), Some(v_str("red")));

    let mut top = a.load(p).unwrap().unwrap();
    top.set("colour", v_str("blue"));
    top.save().unwrap();

    eventually("grandchild sees the new colour", || {
        let b = b.clone();
        async move {
            let y = b.load(y).ok()??;
            (y.get("colour").ok()? == Some(v_str("blue"))).then_some(())
        }
    })
    .await;
    a.shutdown();
    b.shutdown();
}

#[tokio::test]
async fn test_reused_identity_reaches_grandchildren_across_fjall_handles() {
    let dir = tempfile::tempdir().unwrap();
    let (sa, sb) = fjall_pair(&dir);
    let a = start(&sa);
    let b = start(&sb);

    let top = a
        .create(CreateSpec::default().with_property("k", v_int(1)))
        .unwrap()
        .id();
    let x = a.create(CreateSpec::new(top)).unwrap().id();
    let y = a.create(CreateSpec::new(x)).unwrap().id();
    a.recycle(top, Privilege::Builder).unwrap();

    let k = |id| b.load(id).ok().flatten().and_then(|h| h.get("k").ok());
    eventually("recycled ancestor stops inheritance", || async {
        (k(y)? == None).then_some(())
    })
    .await;

    let reborn = a
        .create(CreateSpec::default().with_property("k", v_int(2)))
        .unwrap();
    assert_eq!(reborn.id(), top);
    eventually("grandchild inherits from the reused identity", || async {
        (k(y)? == Some(v_int(2))).then_some(())
    })
    .await;
    assert_eq!(k(x), Some(Some(v_int(2))));
    a.shutdown();
    b.shutdown();
}

#[tokio::test]
async fn test_alias_registered_through_one_handle_reaches_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let (sa, sb) = fjall_pair(&dir);
    let a = start(&sa);
    let b = start(&sb);
    let lamp = a.create(CreateSpec::default()).unwrap().id();
    a.register_alias("lamp", lamp).unwrap();
    let seen = eventually("alias", || {
        let b = b.clone();
        async move { b.resolve_alias("lamp") }
    })
    .await;
    assert_eq!(seen, lamp);
}

#[tokio::test]
async fn test_greet_update_across_store_server_clients() {
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
    let server = std::thread::spawn(move || server.serve(ks).unwrap());

    let client = || Arc::new(RemoteStore::new(zmq::Context::new(), rpc.clone()));
    let a = start(&client());
    let b = start(&client());
    greet_update_scenario(a.clone(), b.clone()).await;

    a.shutdown();
    b.shutdown();
    kill_switch.store(true, Ordering::SeqCst);
    server.join().unwrap();
}
