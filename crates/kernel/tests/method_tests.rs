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

//! Method invocation through the manager: dispatch along the prototype chain, the registry as seen
//! from method code, exceptions and their origin, and cooperative suspension.

mod support;

use pretty_assertions::assert_eq;
use protocosm_common::model::{Privilege, WorldStateError};
use protocosm_db::MemoryStore;
use protocosm_kernel::{CreateSpec, KernelConfig};
use protocosm_var::{ROOT_PROTOTYPE, v_bool, v_empty_list, v_int, v_list, v_obj, v_str};
use std::sync::Arc;
use std::time::Duration;
use support::{exception_code, fast_config, o, seed, start, start_with};

#[tokio::test]
async fn test_inherited_method_runs_against_receiver() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let proto = manager
        .create(
            CreateSpec::default()
                .with_property("hp", v_int(100))
                .with_method("damage", "this.hp = this.hp - args[1]; return this.hp;"),
        )
        .unwrap();
    let goblin = manager.create(CreateSpec::new(proto.id())).unwrap();

    let hp = goblin.call("damage", vec![v_int(30)]).await.unwrap();
    assert_eq!(hp, v_int(70));

    // The write landed on the receiver and shadows the prototype's value.
    let goblin = manager.load(goblin.id()).unwrap().unwrap();
    let proto = manager.load(proto.id()).unwrap().unwrap();
    assert_eq!(goblin.get_own("hp"), Some(&v_int(70)));
    assert_eq!(proto.get("hp").unwrap(), Some(v_int(100)));
}

#[tokio::test]
async fn test_method_not_found() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let thing = manager.create(CreateSpec::default()).unwrap();
    assert_eq!(
        thing.call("nope", vec![]).await,
        Err(WorldStateError::MethodNotFound(thing.id(), "nope".to_string()))
    );
    assert_eq!(
        manager.call(o(404), "nope", vec![], Privilege::Builder).await,
        Err(WorldStateError::ObjectNotFound(o(404)))
    );
}

#[tokio::test]
async fn test_missing_method_is_catchable_in_method_code() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let thing = manager
        .create(CreateSpec::default().with_method(
            "attempt",
            r#"
            try
                return this:nope();
            except e (E_VERBNF)
                return e["code"];
            endtry
            "#,
        ))
        .unwrap();
    assert_eq!(thing.call("attempt", vec![]).await.unwrap(), v_str("E_VERBNF"));
}

#[tokio::test]
async fn test_exception_carries_origin() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let inner = manager
        .create(CreateSpec::default().with_method(
            "boom",
            "let x = 1;\nraise(\"E_INVARG\", \"bad input\");\nreturn x;",
        ))
        .unwrap();
    manager.register_alias("inner", inner.id()).unwrap();
    let outer = manager
        .create(CreateSpec::default().with_method("relay", "return $inner:boom();"))
        .unwrap();

    let Err(WorldStateError::MethodException {
        obj,
        method,
        exception,
    }) = outer.call("relay", vec![]).await
    else {
        panic!("expected a method exception");
    };
    assert_eq!((obj, method.as_str()), (outer.id(), "relay"));
    assert_eq!(exception.error.message(), "bad input");
    let origin = exception.origin().unwrap();
    assert_eq!((origin.obj, origin.method.as_str()), (inner.id(), "boom"));
    assert_eq!(origin.line, Some(2));
    assert_eq!(exception.backtrace.len(), 2);
}

#[tokio::test]
async fn test_caught_nested_exception_does_not_leak_backtrace() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    seed(&store, 10, &[("boom", "raise(\"E_INVARG\");")]);
    let outer = manager
        .create(CreateSpec::default().with_method(
            "relay",
            r#"
            try
                #10:boom();
            except (ANY)
            endtry
            raise("E_INVARG");
            "#,
        ))
        .unwrap();
    let Err(WorldStateError::MethodException { exception, .. }) =
        outer.call("relay", vec![]).await
    else {
        panic!("expected a method exception");
    };
    assert_eq!(exception.backtrace.len(), 1);
    assert_eq!(exception.origin().unwrap().obj, outer.id());
}

#[tokio::test]
async fn test_compile_error_reports_definer() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let proto = manager
        .create(CreateSpec::default().with_method("broken", "return (;"))
        .unwrap();
    let child = manager.create(CreateSpec::new(proto.id())).unwrap();
    let Err(WorldStateError::Compile { obj, method, .. }) = child.call("broken", vec![]).await
    else {
        panic!("expected a compile error");
    };
    assert_eq!((obj, method.as_str()), (proto.id(), "broken"));
}

#[tokio::test]
async fn test_compiled_method_is_reused_until_source_changes() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let mut thing = manager
        .create(CreateSpec::default().with_method("answer", "return 42;"))
        .unwrap();
    // Let the change feed deliver the create before counting compiled entries.
    tokio::time::sleep(Duration::from_millis(100)).await;
    for _ in 0..3 {
        assert_eq!(thing.call("answer", vec![]).await.unwrap(), v_int(42));
    }
    assert_eq!(manager.cache_stats().methods, 1);

    thing.set_method("answer", "return 43;");
    thing.save().unwrap();
    assert_eq!(thing.call("answer", vec![]).await.unwrap(), v_int(43));
}

#[tokio::test]
async fn test_registry_from_method_code() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let maker = manager
        .create(CreateSpec::default().with_method(
            "make",
            r#"
            let kid = registry:create(#1, ["hp" -> 10]);
            registry:register_alias("kid", kid);
            registry:set_method(kid, "hp", "return this.hp;");
            return {kid:hp(), $kid == kid, registry:valid(kid), registry:parent(kid),
                    kid in registry:children(#1), registry:method_source(kid, "hp")};
            "#,
        ))
        .unwrap();

    let result = maker.call("make", vec![]).await.unwrap();
    let kid = manager.resolve_alias("kid").unwrap();
    assert_eq!(
        result,
        v_list(&[
            v_int(10),
            v_bool(true),
            v_bool(true),
            v_obj(ROOT_PROTOTYPE),
            v_bool(true),
            v_str("return this.hp;"),
        ])
    );
    assert_eq!(
        manager.load(kid).unwrap().unwrap().get_own("hp"),
        Some(&v_int(10))
    );
}

#[tokio::test]
async fn test_registry_privileges_apply_in_method_code() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let janitor = manager
        .create(CreateSpec::default().with_method(
            "sweep",
            r#"
            try
                registry:recycle(args[1]);
                return "recycled";
            except e (E_PERM)
                return e["code"];
            endtry
            "#,
        ))
        .unwrap();
    let target = manager.create(CreateSpec::default()).unwrap().id();

    let as_player = manager
        .call(janitor.id(), "sweep", vec![v_obj(target)], Privilege::Player)
        .await
        .unwrap();
    assert_eq!(as_player, v_str("E_PERM"));
    let as_builder = manager
        .call(janitor.id(), "sweep", vec![v_obj(target)], Privilege::Builder)
        .await
        .unwrap();
    assert_eq!(as_builder, v_str("recycled"));
    assert!(manager.load(target).unwrap().is_none());

    let protected = manager
        .call(janitor.id(), "sweep", vec![v_obj(ROOT_PROTOTYPE)], Privilege::Wizard)
        .await
        .unwrap();
    assert_eq!(protected, v_str("E_PERM"));
}

#[tokio::test]
async fn test_unknown_registry_op_and_alias() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let thing = manager
        .create(
            CreateSpec::default()
                .with_method("frob", "return registry:frobnicate();")
                .with_method("lost", "return $nowhere;"),
        )
        .unwrap();
    assert_eq!(exception_code(thing.call("frob", vec![]).await), "E_INVARG");
    assert_eq!(exception_code(thing.call("lost", vec![]).await), "E_INVARG");
}

#[tokio::test]
async fn test_call_depth_limit() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let config = KernelConfig {
        max_call_depth: 8,
        ..fast_config()
    };
    let manager = start_with(&store, config);
    let thing = manager
        .create(CreateSpec::default().with_method("recurse", "return this:recurse();"))
        .unwrap();
    assert_eq!(exception_code(thing.call("recurse", vec![]).await), "E_MAXREC");
}

#[tokio::test]
async fn test_suspended_methods_interleave() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let manager = start(&store);
    let journal = manager
        .create(
            CreateSpec::default()
                .with_property("log", v_empty_list())
                .with_method(
                    "slow",
                    r#"
                    this.log = listappend(this.log, "slow start");
                    suspend(0.05);
                    this.log = listappend(this.log, "slow end");
                    return "slow";
                    "#,
                )
                .with_method(
                    "fast",
                    r#"this.log = listappend(this.log, "fast"); return "fast";"#,
                ),
        )
        .unwrap();

    let (slow, fast) = tokio::join!(
        journal.call("slow", vec![]),
        journal.call("fast", vec![])
    );
    assert_eq!(slow.unwrap(), v_str("slow"));
    assert_eq!(fast.unwrap(), v_str("fast"));

    let journal = manager.load(journal.id()).unwrap().unwrap();
    assert_eq!(
        journal.get_own("log"),
        Some(&v_list(&[
            v_str("slow start"),
            v_str("fast"),
            v_str("slow end")
        ]))
    );
}

#[tokio::test]
async fn test_long_loop_yields_and_completes() {
    let store = Arc::new(MemoryStore::new_in_memory());
    let config = KernelConfig {
        tick_slice: 50,
        ..fast_config()
    };
    let manager = start_with(&store, config);
    let counter = manager
        .create(CreateSpec::default().with_method(
            "count",
            "let total = 0;\nfor i in [1..1000]\n  total = total + i;\nendfor\nreturn total;",
        ))
        .unwrap();
    assert_eq!(counter.call("count", vec![]).await.unwrap(), v_int(500500));
}
