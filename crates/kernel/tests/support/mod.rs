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

#![allow(dead_code)]

use protocosm_common::model::{ObjectDocument, WorldStateError};
use protocosm_db::{FeedConfig, MemoryStore, ObjectStore};
use protocosm_kernel::{KernelConfig, ObjectManager, bootstrap};
use protocosm_var::{Obj, ROOT_PROTOTYPE};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn o(id: i64) -> Obj {
    Obj::mk_id(id)
}

pub fn fast_config() -> KernelConfig {
    KernelConfig {
        feed: FeedConfig {
            poll_interval: Duration::from_millis(5),
            batch_size: 64,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        },
        ..KernelConfig::default()
    }
}

/// A bootstrapped manager over `store`.
pub fn start<S: ObjectStore + 'static>(store: &Arc<S>) -> Arc<ObjectManager> {
    start_with(store, fast_config())
}

pub fn start_with<S: ObjectStore + 'static>(
    store: &Arc<S>,
    config: KernelConfig,
) -> Arc<ObjectManager> {
    let manager = ObjectManager::start(store.clone(), config).unwrap();
    bootstrap(&manager).unwrap();
    manager
}

/// Put an object with the given methods straight into the store, under a fixed identity.
pub fn seed(store: &MemoryStore, id: i64, methods: &[(&str, &str)]) {
    let mut doc = ObjectDocument::new(o(id), ROOT_PROTOTYPE);
    for (name, code) in methods {
        doc = doc.with_method(name, code);
    }
    store.create(doc).unwrap();
}

/// Poll `f` until it yields `Some`, failing the test after a few seconds.
pub async fn eventually<T, F, Fut>(what: &str, f: F) -> T
where
    F: Fn() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(v) = f().await {
            return v;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn exception_code(result: Result<protocosm_var::Var, WorldStateError>) -> String {
    match result {
        Err(WorldStateError::MethodException { exception, .. }) => {
            exception.error.err_type.to_string()
        }
        other => panic!("expected a method exception, got {other:?}"),
    }
}
